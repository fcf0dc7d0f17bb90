//! Topic catalog: the built-in set, or a TOML file of `[[topic]]` tables.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::core::types::Topic;

pub const MAX_DESCRIPTION_BYTES: usize = 500;
pub const MAX_EXAMPLE_BYTES: usize = 5_000;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    topic: Vec<Topic>,
}

/// Built-in topics: common Python builtins with short runnable examples.
pub fn builtin_catalog() -> Vec<Topic> {
    vec![
        Topic::new(
            "len()",
            "Returns the length of an object (string, list, etc.).",
            "my_list = [1, 2, 3, 4, 5]\n\
             print(f'List length: {len(my_list)}')  # Output: List length: 5\n\n\
             my_string = 'Hello World'\n\
             print(f'String length: {len(my_string)}')  # Output: String length: 11",
        ),
        Topic::new(
            "range()",
            "Generates a sequence of numbers.",
            "# Basic range\n\
             for i in range(5):\n    print(i, end=' ')  # Output: 0 1 2 3 4\n\n\
             # Range with start and stop\n\
             for i in range(2, 7):\n    print(i, end=' ')  # Output: 2 3 4 5 6",
        ),
        Topic::new(
            "str()",
            "Converts an object to a string.",
            "num = 42\n\
             result = str(num) + ' apples'\n\
             print(result)  # Output: '42 apples'\n\n\
             pi = 3.14159\n\
             print(f'Pi as string: {str(pi)}')  # Output: Pi as string: 3.14159",
        ),
        Topic::new(
            "type()",
            "Returns the type of an object.",
            "num = 42\n\
             text = 'Hello'\n\
             my_list = [1, 2, 3]\n\n\
             print(type(num))      # Output: <class 'int'>\n\
             print(type(text))     # Output: <class 'str'>\n\
             print(type(my_list))  # Output: <class 'list'>",
        ),
        Topic::new(
            "print()",
            "Outputs text or variables to the console.",
            "name = 'Alice'\n\
             age = 25\n\n\
             print('Hello, World!')  # Basic print\n\
             print(f'Name: {name}, Age: {age}')  # Formatted string\n\
             print(name, age, sep=' - ')  # Custom separator",
        ),
        Topic::new(
            "input()",
            "Gets user input from the console.",
            "# Basic input\n\
             user_name = input('Enter your name: ')\n\
             print(f'Hello, {user_name}!')\n\n\
             # Input with type conversion\n\
             age = int(input('Enter your age: '))\n\
             print(f'You are {age} years old')",
        ),
    ]
}

/// Load the catalog from `path`, or the built-in one when `path` is `None`.
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<Topic>> {
    let topics = match path {
        None => builtin_catalog(),
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            let file: CatalogFile =
                toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
            file.topic
        }
    };
    validate_catalog(&topics)?;
    debug!(topics = topics.len(), "catalog loaded");
    Ok(topics)
}

pub fn validate_catalog(topics: &[Topic]) -> Result<()> {
    if topics.is_empty() {
        return Err(anyhow!("catalog must contain at least one topic"));
    }
    for (idx, topic) in topics.iter().enumerate() {
        let n = idx + 1;
        if topic.label.trim().is_empty() {
            return Err(anyhow!("topic {n}: label must not be empty"));
        }
        if topic.description.len() > MAX_DESCRIPTION_BYTES {
            return Err(anyhow!(
                "topic {n} ({}): description exceeds {MAX_DESCRIPTION_BYTES} bytes",
                topic.label
            ));
        }
        if topic.example.trim().is_empty() {
            return Err(anyhow!("topic {n} ({}): example must not be empty", topic.label));
        }
        if topic.example.len() > MAX_EXAMPLE_BYTES {
            return Err(anyhow!(
                "topic {n} ({}): example exceeds {MAX_EXAMPLE_BYTES} bytes",
                topic.label
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let topics = load_catalog(None).expect("builtin");
        let labels: Vec<&str> = topics.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["len()", "range()", "str()", "type()", "print()", "input()"]
        );
    }

    #[test]
    fn loads_topics_from_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("topics.toml");
        fs::write(
            &path,
            r#"
[[topic]]
label = "abs()"
description = "Returns the absolute value of a number."
example = "print(abs(-3))"

[[topic]]
label = "sorted()"
description = "Returns a new sorted list."
example = "print(sorted([3, 1, 2]))"
"#,
        )
        .expect("write");
        let topics = load_catalog(Some(&path)).expect("load");
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[1].label, "sorted()");
    }

    #[test]
    fn empty_file_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("topics.toml");
        fs::write(&path, "").expect("write");
        let err = load_catalog(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("at least one topic"));
    }

    #[test]
    fn oversize_fields_are_rejected() {
        let long_description = vec![Topic::new("x()", &"d".repeat(501), "print(1)")];
        assert!(validate_catalog(&long_description).is_err());
        let long_example = vec![Topic::new("x()", "ok", &"e".repeat(5_001))];
        assert!(validate_catalog(&long_example).is_err());
    }
}
