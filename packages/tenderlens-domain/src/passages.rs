/// Splits extracted document text into indexable passages.
///
/// Passages follow paragraph boundaries (blank lines) and are re-joined
/// greedily up to `max_chars`. A single paragraph longer than `max_chars` is
/// hard-split on char boundaries so no passage ever exceeds the cap.
pub fn split_passages(text: &str, max_chars: usize) -> Vec<String> {
	let max_chars = max_chars.max(1);
	let mut passages = Vec::new();
	let mut current = String::new();

	for paragraph in text.split("\n\n") {
		let paragraph = paragraph.trim();

		if paragraph.is_empty() {
			continue;
		}

		if paragraph.chars().count() > max_chars {
			flush(&mut passages, &mut current);

			let mut chunk = String::new();

			for ch in paragraph.chars() {
				if chunk.chars().count() >= max_chars {
					passages.push(std::mem::take(&mut chunk));
				}

				chunk.push(ch);
			}

			flush(&mut passages, &mut chunk);

			continue;
		}

		let joined_len = current.chars().count() + paragraph.chars().count() + 2;

		if !current.is_empty() && joined_len > max_chars {
			flush(&mut passages, &mut current);
		}
		if !current.is_empty() {
			current.push_str("\n\n");
		}

		current.push_str(paragraph);
	}

	flush(&mut passages, &mut current);

	passages
}

fn flush(passages: &mut Vec<String>, current: &mut String) {
	if !current.is_empty() {
		passages.push(std::mem::take(current));
	}
}
