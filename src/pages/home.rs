use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::debug;

use crate::components::force_graph::ForceGraphCanvas;
use crate::config::Config;
use crate::fetch::{FetchOrchestrator, LoadOutcome, RelayClient, View, ViewData, YearFilter};
use crate::graph::{BuildReport, Graph};
use crate::summary::{CveSummary, ProductCount};

fn shown(visible: bool) -> &'static str {
	if visible { "block" } else { "none" }
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let config = Config::load_from_document();
	let orchestrator = Rc::new(RefCell::new(
		FetchOrchestrator::new(RelayClient::new(config.relay_url.clone()), config.queries())
			.with_page_size(config.page_size),
	));

	let (view, set_view) = signal(View::Graph);
	let (year, set_year) = signal(YearFilter::All);
	let (loading, set_loading) = signal(false);
	let (failure, set_failure) = signal(None::<String>);
	let (report, set_report) = signal(None::<BuildReport>);
	let (counts, set_counts) = signal(Vec::<ProductCount>::new());
	let (top, set_top) = signal(Vec::<CveSummary>::new());
	let graph = RwSignal::new(Graph::new());

	// every change of view or year supersedes the previous load
	Effect::new(move |_| {
		let (v, y) = (view.get(), year.get());
		let orchestrator = Rc::clone(&orchestrator);
		set_loading.set(true);
		set_failure.set(None);
		spawn_local(async move {
			match FetchOrchestrator::load(&orchestrator, v, y).await {
				LoadOutcome::Loaded(data) => {
					match data {
						ViewData::Graph { graph: g, report: r } => {
							graph.set(g);
							set_report.set(Some(r));
						}
						ViewData::Bubble(c) => set_counts.set(c),
						ViewData::Stats { top: t, counts: c } => {
							set_top.set(t);
							set_counts.set(c);
						}
					}
					set_loading.set(false);
				}
				LoadOutcome::Canceled => debug!("{} load superseded", v.key()),
				LoadOutcome::Failed(err) => {
					graph.set(Graph::new());
					set_report.set(None);
					set_counts.set(Vec::new());
					set_top.set(Vec::new());
					set_failure.set(Some(err.to_string()));
					set_loading.set(false);
				}
			}
		});
	});

	let years = config.years.clone();
	let layout = config.layout.clone();

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph" style:display=move || shown(view.get() == View::Graph)>
				<ForceGraphCanvas graph=graph layout=layout fullscreen=true />
			</div>

			<div class="graph-overlay">
				<h1>"Packages & Vulnerabilities"</h1>
				<div class="controls">
					<select
						id="viewSelect"
						prop:value=move || view.get().key()
						on:change=move |ev| {
							if let Some(v) = View::from_key(&event_target_value(&ev)) {
								set_view.set(v);
							}
						}
					>
						{View::ALL
							.into_iter()
							.map(|v| view! { <option value=v.key()>{v.title()}</option> })
							.collect_view()}
					</select>
					<select
						id="yearSelect"
						style:display=move || shown(view.get() == View::Graph)
						on:change=move |ev| {
							if let Some(y) = YearFilter::parse(&event_target_value(&ev)) {
								set_year.set(y);
							}
						}
					>
						<option value="all">"All years"</option>
						{years
							.into_iter()
							.map(|y| view! { <option value=y.to_string()>{y.to_string()}</option> })
							.collect_view()}
					</select>
				</div>
				<p class="subtitle" style:display=move || shown(view.get() == View::Graph)>
					"Click a node to expand it. Drag nodes to reposition. Scroll to zoom. Drag background to pan."
				</p>
				<Show when=move || loading.get()>
					<div class="loading-spinner">"Loading…"</div>
				</Show>
				{move || failure.get().map(|msg| view! { <p class="load-error">{msg}</p> })}
				{move || {
					report
						.get()
						.filter(|_| view.get() == View::Graph)
						.map(|r| {
							view! {
								<p class="subtitle">
									{format!(
										"{} rows, {} skipped, {} outside version range",
										r.rows,
										r.skipped,
										r.filtered,
									)}
								</p>
							}
						})
				}}
			</div>

			<div class="bubble-view" style:display=move || shown(view.get() == View::Bubble)>
				<ul>
					<For
						each=move || counts.get()
						key=|c| c.product.clone()
						children=move |c: ProductCount| {
							view! {
								<li>
									<span class="product">{c.product}</span>
									<span class="count">{c.count}</span>
								</li>
							}
						}
					/>
				</ul>
			</div>

			<div id="stats-view" style:display=move || shown(view.get() == View::Stats)>
				<table>
					<thead>
						<tr>
							<th>"CVE"</th>
							<th>"Score"</th>
							<th>"Severity"</th>
							<th>"CVSS"</th>
						</tr>
					</thead>
					<tbody>
						<For
							each=move || top.get()
							key=|c| c.id.clone()
							children=move |c: CveSummary| {
								view! {
									<tr>
										<td>{c.id}</td>
										<td>{format!("{:.1}", c.score)}</td>
										<td>{c.severity}</td>
										<td>{c.cvss_version}</td>
									</tr>
								}
							}
						/>
					</tbody>
				</table>
				<div id="count-cves-on-products">
					<h2>"CVEs per product"</h2>
					<ul>
						<For
							each=move || counts.get()
							key=|c| c.product.clone()
							children=move |c: ProductCount| {
								view! {
									<li>
										<span class="product">{c.product}</span>
										<span class="count">{c.count}</span>
									</li>
								}
							}
						/>
					</ul>
				</div>
			</div>
		</ErrorBoundary>
	}
}
