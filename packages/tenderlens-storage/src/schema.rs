pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_analyses.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_analyses.sql")),
				"tables/002_analysis_tasks.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_analysis_tasks.sql")),
				"tables/003_search_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_search_records.sql")),
				"tables/004_tender_results.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_tender_results.sql")),
				"tables/005_filtered_results.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_filtered_results.sql")),
				"tables/006_notifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_notifications.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_expands_every_include() {
		let schema = render_schema();

		assert!(!schema.contains("\\ir "));

		for table in [
			"analyses",
			"analysis_tasks",
			"search_records",
			"tender_results",
			"filtered_results",
			"notifications",
		] {
			assert!(
				schema.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
				"schema is missing {table}"
			);
		}
	}
}
