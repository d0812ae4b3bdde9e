//! Language-specific fallback sources used when the completion oracle is
//! unavailable or exceeds its deadline.

fn quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Picks the fallback template for the requested language.
pub fn fallback_source(language: &str, description: &str) -> String {
    match language.to_lowercase().as_str() {
        "go" | "golang" => go_template(description),
        "python" | "py" => python_template(description),
        other => generic_template(other, description),
    }
}

fn go_template(description: &str) -> String {
    format!(
        r#"package main

import (
	"fmt"
	"log"
)

func main() {{
	log.SetFlags(0)
	fmt.Println("service: {desc}")
	if err := run(); err != nil {{
		log.Fatal(err)
	}}
}}

func run() error {{
	fmt.Println("ready")
	return nil
}}
"#,
        desc = quoted(description)
    )
}

fn python_template(description: &str) -> String {
    format!(
        r#""""Generated service skeleton."""


def run() -> int:
    print("service: {desc}")
    print("ready")
    return 0


if __name__ == "__main__":
    raise SystemExit(run())
"#,
        desc = quoted(description)
    )
}

fn generic_template(language: &str, description: &str) -> String {
    format!(
        "# {language} skeleton\n# {description}\n\nready\n",
        language = language,
        description = description
    )
}
