//! Rendering retrieved chunks into the prompt's context block.

use ragrelay_core::knowledge::{FileMetadata, RetrievedChunk};
use std::collections::HashMap;

/// Render chunks grouped by file, files in first-appearance order.
///
/// Chunks whose file did not resolve are dropped. Within a file, chunks are
/// ordered by ascending `seq_num`. Returns an empty string when nothing is
/// left to render.
pub fn render_context(chunks: &[RetrievedChunk], files: &HashMap<String, FileMetadata>) -> String {
    let mut groups: Vec<(&str, Vec<&RetrievedChunk>)> = Vec::new();
    for chunk in chunks {
        match groups.iter().position(|(id, _)| *id == chunk.file_id) {
            Some(slot) => groups[slot].1.push(chunk),
            None => groups.push((chunk.file_id.as_str(), vec![chunk])),
        }
    }

    let mut parts = Vec::new();
    for (file_id, mut members) in groups {
        let Some(file) = files.get(file_id) else {
            continue;
        };
        members.sort_by_key(|c| c.seq_num);

        parts.push(format!(r#"<file name="{}" file_id="{file_id}" >"#, file.name));
        for chunk in members {
            parts.push(format!(
                "<page number=\"{}\" >\n<content>\n{}\n</content>\n</page>",
                chunk.page, chunk.content
            ));
        }
        parts.push("</file>".to_string());
    }

    if parts.is_empty() {
        return String::new();
    }
    format!("<context>\n{}\n</context>", parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(file_id: &str, seq_num: u32, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            content: content.into(),
            page: seq_num + 10,
            seq_num,
            score: 0.5,
            file_id: file_id.into(),
        }
    }

    fn files(entries: &[(&str, &str)]) -> HashMap<String, FileMetadata> {
        entries
            .iter()
            .map(|(id, name)| (id.to_string(), FileMetadata { name: name.to_string() }))
            .collect()
    }

    #[test]
    fn groups_by_file_and_orders_by_sequence() {
        let chunks = [chunk("A", 2, "a-two"), chunk("A", 1, "a-one"), chunk("B", 1, "b-one")];
        let rendered = render_context(&chunks, &files(&[("A", "doc1"), ("B", "doc2")]));

        let a_one = rendered.find("a-one").unwrap();
        let a_two = rendered.find("a-two").unwrap();
        let b_one = rendered.find("b-one").unwrap();
        assert!(a_one < a_two);
        assert!(a_two < b_one);

        assert!(rendered.starts_with("<context>\n<file name=\"doc1\" file_id=\"A\" >\n<page number=\"11\" >"));
        assert!(rendered.ends_with("</file>\n</context>"));
        assert_eq!(rendered.matches("</file>").count(), 2);
    }

    #[test]
    fn unresolved_files_are_dropped() {
        let chunks = [chunk("gone", 1, "ghost"), chunk("B", 1, "kept")];
        let rendered = render_context(&chunks, &files(&[("B", "doc2")]));
        assert!(!rendered.contains("ghost"));
        assert!(rendered.contains("kept"));
    }

    #[test]
    fn nothing_resolvable_renders_empty() {
        assert_eq!(render_context(&[], &HashMap::new()), "");
        let chunks = [chunk("gone", 1, "ghost")];
        assert_eq!(render_context(&chunks, &HashMap::new()), "");
    }
}
