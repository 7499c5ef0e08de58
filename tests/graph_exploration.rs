//! Rows in, interactive graph out: build, disclose, lay out, drag.

use cve_graph_explorer::components::force_graph::{ForceGraphState, GraphCommand, LayoutConfig};
use cve_graph_explorer::disclosure::{Disclosure, DisclosureController};
use cve_graph_explorer::graph::{Graph, GraphModelBuilder, NodeKind, Relation, Row};

fn rows() -> Vec<Row> {
	vec![
		Row::from_pairs([
			("cve", "http://purl.org/cyber/cve#CVE-2021-23017"),
			("base_score", "7.7"),
			("product_name", "nginx"),
			("version_interval", "http://purl.org/cyber/cve#nginx_0_6_18"),
			("version_min", "0.6.18"),
			("version_max", "1.20.0"),
			("log", "http://www.semanticweb.org/logs#event_1"),
			("type", "http://www.semanticweb.org/logs#ActionEvent"),
			("package_name", "nginx"),
			("package_version", "1.18.0"),
			("package_architecture", "amd64"),
		]),
		// 1.21.0 is outside the interval, so the whole row is dropped
		Row::from_pairs([
			("cve", "http://purl.org/cyber/cve#CVE-2021-23017"),
			("product_name", "nginx"),
			("version_interval", "http://purl.org/cyber/cve#nginx_0_6_18"),
			("version_min", "0.6.18"),
			("version_max", "1.20.0"),
			("log", "http://www.semanticweb.org/logs#event_2"),
			("package_name", "nginx"),
			("package_version", "1.21.0"),
			("package_architecture", "amd64"),
		]),
		Row::from_pairs([
			("cve", "http://purl.org/cyber/cve#CVE-2022-0778"),
			("base_score", "7.5"),
			("reference", "https://www.openssl.org/news/secadv/20220315.txt"),
			("product_name", "openssl"),
			("version_interval", "http://purl.org/cyber/cve#openssl_1_1_1"),
			("version_min", "1.1.1"),
			("version_max", "1.1.1m"),
		]),
		Row::from_pairs([("description", "no identifying field")]),
	]
}

fn graph() -> Graph {
	let (graph, report) = GraphModelBuilder::build(&rows());
	assert_eq!(report.rows, 4);
	assert_eq!(report.filtered, 1);
	assert_eq!(report.skipped, 1);
	graph
}

#[test]
fn gated_row_leaves_no_trace() {
	let graph = graph();
	assert!(!graph.contains("event_2"));
	assert!(!graph.contains("nginx-1.21.0-amd64"));
	assert!(graph.has_edge("nginx-1.18.0-amd64", "nginx_0_6_18", Relation::VersionMatches));
	assert_eq!(graph.nodes_of_kind(NodeKind::Reference).count(), 1);
}

#[test]
fn merge_is_idempotent_and_order_free() {
	let all = rows();
	let (a, _) = GraphModelBuilder::build(&all[..1]);
	let (b, _) = GraphModelBuilder::build(&all[2..]);

	let ab = Graph::merged(a.clone(), b.clone());
	let ba = Graph::merged(b, a.clone());
	assert_eq!(ab.node_count(), ba.node_count());
	assert_eq!(ab.edge_count(), ba.edge_count());
	for node in ab.nodes() {
		assert!(ba.contains(&node.id), "{} missing", node.id);
	}

	let again = Graph::merged(ab.clone(), a);
	assert_eq!(again.node_count(), ab.node_count());
	assert_eq!(again.edge_count(), ab.edge_count());
}

#[test]
fn disclosure_walks_the_hierarchy() {
	let graph = graph();
	let mut disclosure = DisclosureController::new(&graph);
	let visible = disclosure.visible(&graph);
	assert!(visible.contains("prod_nginx"));
	assert!(visible.contains("prod_openssl"));
	assert!(visible.contains("event_1"));
	assert!(!visible.contains("CVE-2021-23017"));

	assert_eq!(disclosure.toggle("prod_nginx"), Some(Disclosure::Expanded));
	assert_eq!(disclosure.toggle("nginx_0_6_18"), Some(Disclosure::Expanded));
	assert!(disclosure.is_visible("CVE-2021-23017"));

	// collapsing the root hides the whole subtree but remembers it
	assert_eq!(disclosure.toggle("prod_nginx"), Some(Disclosure::Collapsed));
	assert!(!disclosure.is_visible("nginx_0_6_18"));
	assert!(!disclosure.is_visible("CVE-2021-23017"));
	disclosure.toggle("prod_nginx");
	assert!(disclosure.is_visible("CVE-2021-23017"));

	let visible = disclosure.visible(&graph);
	for edge in &visible.edges {
		assert!(visible.contains(&edge.source) && visible.contains(&edge.target));
	}
}

#[test]
fn interaction_keeps_layout_finite() {
	let mut state = ForceGraphState::new(graph(), 1024.0, 768.0, LayoutConfig::default());
	let commands = [
		GraphCommand::Toggle("prod_nginx".into()),
		GraphCommand::Toggle("event_1".into()),
		GraphCommand::Pin {
			id: "prod_nginx".into(),
			x: 10.0,
			y: -40.0,
		},
		GraphCommand::Toggle("nginx_0_6_18".into()),
		GraphCommand::Release("prod_nginx".into()),
		GraphCommand::ZoomAt {
			x: 300.0,
			y: 200.0,
			factor: 1.5,
		},
		GraphCommand::Toggle("prod_nginx".into()),
		GraphCommand::Toggle("prod_openssl".into()),
	];
	for command in commands {
		state.apply(command);
		for _ in 0..20 {
			state.tick(0.016);
		}
		assert_eq!(state.layout().len(), state.visible().nodes.len());
		for (id, node) in state.layout().iter() {
			assert!(node.x.is_finite() && node.y.is_finite(), "{id} diverged");
		}
	}
	assert!(!state.visible().contains("CVE-2021-23017"));
	assert!(state.visible().contains("CVE-2022-0778") || state.visible().contains("openssl_1_1_1"));
}

#[test]
fn replacing_the_graph_collapses_everything() {
	let mut state = ForceGraphState::new(graph(), 800.0, 600.0, LayoutConfig::default());
	state.apply(GraphCommand::Toggle("prod_nginx".into()));
	assert!(state.visible().contains("nginx_0_6_18"));

	state.replace_graph(graph());
	assert!(!state.visible().contains("nginx_0_6_18"));
	assert_eq!(state.layout().len(), state.visible().nodes.len());

	state.replace_graph(Graph::new());
	state.tick(0.016);
	assert!(state.visible().nodes.is_empty());
	assert!(state.layout().is_empty());
}
