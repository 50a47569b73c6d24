/// User-facing names to sandbox language identifiers. Lookup is
/// case-sensitive; `Py` is not a language.
const ALIASES: &[(&str, &str)] = &[
    ("py", "python3"),
    ("python", "python3"),
    ("python3", "python3"),
    ("js", "javascript"),
    ("node", "javascript"),
    ("javascript", "javascript"),
    ("ts", "typescript"),
    ("typescript", "typescript"),
    ("rs", "rust"),
    ("rust", "rust"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("c++", "cpp"),
    ("go", "go"),
    ("golang", "go"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("rb", "ruby"),
    ("ruby", "ruby"),
    ("java", "java"),
    ("hs", "haskell"),
    ("haskell", "haskell"),
    ("lua", "lua"),
];

pub fn resolve(name: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
}

/// Alias listing for the `languages` command, grouped per canonical id.
pub fn listing() -> String {
    let mut lines = Vec::new();

    for (_, canonical) in ALIASES {
        if lines.iter().any(|line: &String| line.starts_with(canonical)) {
            continue;
        }

        let aliases = ALIASES
            .iter()
            .filter(|(_, c)| c == canonical)
            .map(|(alias, _)| *alias)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("{canonical}: {aliases}"));
    }

    lines.join("\n")
}

/// Wraps bare snippets into a runnable program for languages that need an
/// entry point. Pure text transform keyed by the canonical language id.
pub fn apply_boilerplate(language: &str, source: &str) -> String {
    match language {
        "rust" if !source.contains("fn main") => {
            format!("fn main() {{\n{source}\n}}")
        }
        "c" | "cpp" if !source.contains("int main") => {
            let header = if language == "c" {
                "#include <stdio.h>"
            } else {
                "#include <iostream>"
            };
            format!("{header}\n\nint main(void) {{\n{source}\nreturn 0;\n}}")
        }
        "java" if !source.contains("class ") => {
            format!(
                "public class Main {{\n    public static void main(String[] args) {{\n{source}\n    }}\n}}"
            )
        }
        _ => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_sandbox_identifiers() {
        assert_eq!(resolve("python"), Some("python3"));
        assert_eq!(resolve("py"), Some("python3"));
        assert_eq!(resolve("rs"), Some("rust"));
        assert_eq!(resolve("brainfuck"), None);
    }

    #[test]
    fn resolution_is_case_sensitive() {
        assert_eq!(resolve("Python"), None);
        assert_eq!(resolve("PY"), None);
    }

    #[test]
    fn bare_rust_gains_a_main() {
        let wrapped = apply_boilerplate("rust", "println!(\"hi\");");
        assert!(wrapped.starts_with("fn main()"));

        let untouched = apply_boilerplate("rust", "fn main() {}");
        assert_eq!(untouched, "fn main() {}");
    }

    #[test]
    fn python_is_dispatched_verbatim() {
        assert_eq!(apply_boilerplate("python3", "print(1)"), "print(1)");
    }
}
