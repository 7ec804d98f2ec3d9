// Minimal narrative markup: `**text**` is emphasis, `\n` starts a new paragraph.
// Nothing else is interpreted.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub emphasis: bool,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            emphasis: false,
        }
    }

    fn strong(text: &str) -> Self {
        Self {
            text: text.to_string(),
            emphasis: true,
        }
    }
}

pub type Paragraph = Vec<Span>;

fn emphasis_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").ok())
        .as_ref()
}

/// Split `text` into paragraphs of plain and emphasized spans.
pub fn parse(text: &str) -> Vec<Paragraph> {
    text.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> Paragraph {
    let mut spans = Vec::new();
    let Some(pattern) = emphasis_pattern() else {
        if !line.is_empty() {
            spans.push(Span::plain(line));
        }
        return spans;
    };
    let mut last = 0;
    for caps in pattern.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            spans.push(Span::plain(&line[last..whole.start()]));
        }
        spans.push(Span::strong(inner.as_str()));
        last = whole.end();
    }
    if last < line.len() {
        spans.push(Span::plain(&line[last..]));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_and_paragraphs() {
        let p = parse("**TP53**: mutated\nKi-67 is **high** (82%)");
        assert_eq!(p.len(), 2);
        assert_eq!(p[0], vec![Span::strong("TP53"), Span::plain(": mutated")]);
        assert_eq!(
            p[1],
            vec![
                Span::plain("Ki-67 is "),
                Span::strong("high"),
                Span::plain(" (82%)")
            ]
        );
    }

    #[test]
    fn unmatched_markers_and_html_stay_literal() {
        let p = parse("a **b <i>c</i>");
        assert_eq!(p, vec![vec![Span::plain("a **b <i>c</i>")]]);
    }

    #[test]
    fn empty_lines_are_empty_paragraphs() {
        let p = parse("one\n\ntwo");
        assert_eq!(p.len(), 3);
        assert!(p[1].is_empty());
    }
}
