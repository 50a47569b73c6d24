//! Shapes raw sandbox output into a message Discord will accept and that
//! cannot break out of its surrounding code fence or ping anyone.

pub const MAX_LINES: usize = 30;
const MAX_MESSAGE_LEN: usize = 2000;
const LINE_MARKER: &str = "(output truncated to 30 lines)";
const SIZE_MARKER: &str = "(output truncated)";

pub fn shape_output(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "The code ran without producing any output.".to_string();
    }

    let sanitized = raw
        .replace("```", "`\u{200b}``")
        .replace('@', "@\u{200b}");

    let lines = sanitized.lines().collect::<Vec<_>>();
    let line_capped = lines.len() > MAX_LINES;
    let body = lines[..lines.len().min(MAX_LINES)].join("\n");

    let mut message = format!("```\n{body}\n```");
    if line_capped {
        message.push('\n');
        message.push_str(LINE_MARKER);
    }

    if message.len() > MAX_MESSAGE_LEN {
        let overhead = "```\n\n```\n".len() + SIZE_MARKER.len();
        let mut cut = (MAX_MESSAGE_LEN - overhead).min(body.len());
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        message = format!("```\n{}\n```\n{}", &body[..cut], SIZE_MARKER);
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_output_renders_as_a_code_block() {
        assert_eq!(shape_output("1\n"), "```\n1\n```");
    }

    #[test]
    fn empty_output_is_reported_in_prose() {
        assert_eq!(
            shape_output("  \n"),
            "The code ran without producing any output."
        );
    }

    #[test]
    fn forty_lines_are_cut_to_thirty_with_a_marker() {
        let raw = (1..=40).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let shaped = shape_output(&raw);

        assert_eq!(shaped.matches('\n').count(), MAX_LINES + 2);
        assert!(shaped.contains("30"));
        assert!(!shaped.contains("\n31"));
        assert!(shaped.ends_with(LINE_MARKER));
    }

    #[test]
    fn embedded_fences_cannot_escape_the_block() {
        let shaped = shape_output("before ``` after");

        assert!(!shaped.contains("``` after"));
        assert!(shaped.contains('\u{200b}'));
    }

    #[test]
    fn mentions_are_neutralized() {
        let shaped = shape_output("hi @everyone");

        assert!(!shaped.contains("@everyone"));
        assert!(shaped.contains("@\u{200b}everyone"));
    }

    #[test]
    fn oversized_output_stays_under_the_message_limit() {
        let raw = "x".repeat(5000);
        let shaped = shape_output(&raw);

        assert!(shaped.len() <= 2000);
        assert!(shaped.ends_with(SIZE_MARKER));
    }
}
