use thiserror::Error;

/// A parsed `run` invocation, before language resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRequest {
    pub language: String,
    pub source: String,
    pub args: Vec<String>,
}

/// Input defects, reported verbatim to the author. None of these are logged
/// as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("I could not find a code block; wrap your source in triple backticks")]
    MissingCodeBlock,
    #[error("the code block is never closed")]
    UnterminatedCodeBlock,
    #[error("give me exactly one code block per run")]
    ExtraCodeBlock,
    #[error("tell me which language to run; put it after the command or on the code fence")]
    MissingLanguage,
    #[error("the code block is empty")]
    EmptySource,
}

/// Parses everything after the command word: an optional language line,
/// optional argument lines, then exactly one fenced code block.
///
/// The language may sit on its own line before the fence or ride on the
/// fence itself; an explicit line wins over the fence info string. Lines
/// between the language and the fence become one CLI argument each, with
/// blank lines dropped.
pub fn parse_request(text: &str) -> Result<CodeRequest, ParseError> {
    let open = text.find("```").ok_or(ParseError::MissingCodeBlock)?;
    let head = &text[..open];
    let rest = &text[open + 3..];

    let close = rest.find("```").ok_or(ParseError::UnterminatedCodeBlock)?;
    let block = &rest[..close];
    let tail = &rest[close + 3..];

    if tail.contains("```") {
        return Err(ParseError::ExtraCodeBlock);
    }

    // A fence info string only exists when the block spans several lines and
    // its first line is a single bare token.
    let (info, body) = match block.split_once('\n') {
        Some((first, remainder))
            if !first.trim().is_empty() && !first.trim().contains(char::is_whitespace) =>
        {
            (Some(first.trim()), remainder)
        }
        _ => (None, block),
    };

    let mut head_lines = head
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let explicit = head_lines.next();
    let args = head_lines.map(str::to_string).collect::<Vec<_>>();

    let language = explicit
        .or(info)
        .ok_or(ParseError::MissingLanguage)?
        .to_string();

    let source = body.trim();
    if source.is_empty() {
        return Err(ParseError::EmptySource);
    }

    Ok(CodeRequest {
        language,
        source: source.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_rides_on_the_fence() {
        let request = parse_request("```python\nprint(1)\n```").expect("parses");

        assert_eq!(request.language, "python");
        assert_eq!(request.source, "print(1)");
        assert!(request.args.is_empty());
    }

    #[test]
    fn explicit_language_line_wins_over_the_fence() {
        let request = parse_request("py\n```python\nprint(1)\n```").expect("parses");

        assert_eq!(request.language, "py");
    }

    #[test]
    fn lines_before_the_fence_become_arguments() {
        let request = parse_request("python\nfirst\n\nsecond\n```\nprint(1)\n```").expect("parses");

        assert_eq!(request.args, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn each_defect_gets_its_own_error() {
        assert_eq!(parse_request("print(1)"), Err(ParseError::MissingCodeBlock));
        assert_eq!(
            parse_request("```python\nprint(1)"),
            Err(ParseError::UnterminatedCodeBlock)
        );
        assert_eq!(
            parse_request("```py\na\n``` ```py\nb\n```"),
            Err(ParseError::ExtraCodeBlock)
        );
        assert_eq!(
            parse_request("```\nprint(1)\n```"),
            Err(ParseError::MissingLanguage)
        );
        assert_eq!(
            parse_request("```python\n\n```"),
            Err(ParseError::EmptySource)
        );
    }

    #[test]
    fn single_line_blocks_take_the_language_from_the_head() {
        let request = parse_request("python ```print(1)```").expect("parses");

        assert_eq!(request.language, "python");
        assert_eq!(request.source, "print(1)");
    }
}
