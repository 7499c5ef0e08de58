//! Flat aggregates behind the bubble chart and the severity table.

use log::debug;
use serde::Serialize;

use crate::graph::Row;

/// Number of CVEs affecting one product.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductCount {
	/// Product name.
	pub product: String,
	/// CVEs referencing it.
	pub count: u64,
}

/// One line of the severity table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CveSummary {
	/// CVE identifier.
	pub id: String,
	/// CVSS base score.
	pub score: f64,
	/// CVSS severity label.
	pub severity: String,
	/// CVSS version the score was computed with.
	pub cvss_version: String,
}

/// Decode `product_name`/`cve_count` rows, largest count first.
pub fn product_counts(rows: &[Row]) -> Vec<ProductCount> {
	let mut counts: Vec<ProductCount> = rows
		.iter()
		.enumerate()
		.filter_map(|(i, row)| {
			let product = row.get("product_name");
			let count = row.get("cve_count").and_then(|c| c.trim().parse().ok());
			match (product, count) {
				(Some(product), Some(count)) => Some(ProductCount {
					product: product.to_owned(),
					count,
				}),
				_ => {
					debug!("count row {i} skipped");
					None
				}
			}
		})
		.collect();
	counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.product.cmp(&b.product)));
	counts
}

/// Decode CVE rows into the `limit` highest scores.
pub fn top_cves(rows: &[Row], limit: usize) -> Vec<CveSummary> {
	let mut cves: Vec<CveSummary> = rows
		.iter()
		.filter_map(|row| {
			Some(CveSummary {
				id: row.get_local("cve")?.to_owned(),
				score: row.get_number("base_score").filter(|s| s.is_finite())?,
				severity: row.get("base_severity").unwrap_or("N/A").to_owned(),
				cvss_version: row.get("cvss_version").unwrap_or("N/A").to_owned(),
			})
		})
		.collect();
	cves.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
	cves.dedup_by(|a, b| a.id == b.id);
	cves.truncate(limit);
	cves
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_sorted_desc_and_malformed_skipped() {
		let rows = vec![
			Row::from_pairs([("product_name", "openssl"), ("cve_count", "3")]),
			Row::from_pairs([("product_name", "nginx"), ("cve_count", "12")]),
			Row::from_pairs([("product_name", "bash"), ("cve_count", "many")]),
			Row::from_pairs([("cve_count", "4")]),
		];
		let counts = product_counts(&rows);
		assert_eq!(
			counts,
			vec![
				ProductCount {
					product: "nginx".into(),
					count: 12
				},
				ProductCount {
					product: "openssl".into(),
					count: 3
				},
			]
		);
	}

	#[test]
	fn top_cves_by_score() {
		let row = |id: &str, score: &str| {
			Row::from_pairs([
				("cve", format!("http://purl.org/cyber/cve#{id}")),
				("base_score", score.to_owned()),
				("base_severity", "HIGH".to_owned()),
			])
		};
		let rows = vec![
			row("CVE-1", "5.0"),
			row("CVE-2", "9.8"),
			row("CVE-3", "bogus"),
			row("CVE-4", "7.5"),
			row("CVE-2", "9.8"),
		];
		let top = top_cves(&rows, 2);
		let ids: Vec<_> = top.iter().map(|c| c.id.as_str()).collect();
		assert_eq!(ids, ["CVE-2", "CVE-4"]);
		assert_eq!(top[0].cvss_version, "N/A");
	}
}
