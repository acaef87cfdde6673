use crate::model::s3::{GatewayError, SLASH_SEPARATOR};

/// Normalizes an object key into a relative `/`-separated path.
///
/// Leading, trailing and repeated separators as well as `.` segments are
/// dropped. A `..` segment is rejected.
pub fn clean_key(key: &str) -> Result<String, GatewayError> {
    let mut components = Vec::new();
    for component in key.split(SLASH_SEPARATOR) {
        match component {
            "" | "." => continue,
            ".." => return Err(GatewayError::ObjectNameInvalid(key.to_string())),
            c => components.push(c),
        }
    }

    Ok(components.join(SLASH_SEPARATOR))
}

pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, SLASH_SEPARATOR, name)
    }
}

pub fn is_dir_key(key: &str) -> bool {
    key.ends_with(SLASH_SEPARATOR)
}

/// Hidden sibling of `path` that an upload is written to before it
/// replaces `path`.
pub fn staging_key(path: &str, seq: u64) -> String {
    let (dir, name) = match path.rsplit_once(SLASH_SEPARATOR) {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    };

    join_key(dir, &format!(".{}.objectgw-tmp-{}", name, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_key() {
        let cases = vec![
            ("", ""),
            ("/", ""),
            ("file", "file"),
            ("/folder/file", "folder/file"),
            ("folder/", "folder"),
            ("folder//sub/./file", "folder/sub/file"),
        ];

        for (input, expected) in cases {
            let result = clean_key(input).unwrap();
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_clean_key_traversal() {
        let cases = vec!["..", "../etc/passwd", "folder/../../x"];

        for input in cases {
            assert!(
                matches!(clean_key(input), Err(GatewayError::ObjectNameInvalid(_))),
                "failed for case: {}",
                input
            );
        }
    }

    #[test]
    fn test_join_key() {
        let cases = vec![
            ("", "file", "file"),
            ("folder", "file", "folder/file"),
            ("folder/subfolder", "file", "folder/subfolder/file"),
        ];

        for (prefix, name, expected) in cases {
            assert_eq!(
                join_key(prefix, name),
                expected,
                "failed for case: {}",
                name
            );
        }
    }

    #[test]
    fn test_is_dir_key() {
        assert!(is_dir_key("folder/"));
        assert!(!is_dir_key("folder"));
        assert!(!is_dir_key(""));
    }

    #[test]
    fn test_staging_key() {
        let cases = vec![
            ("file", 0, ".file.objectgw-tmp-0"),
            ("folder/file", 7, "folder/.file.objectgw-tmp-7"),
            ("a/b/c", 42, "a/b/.c.objectgw-tmp-42"),
        ];

        for (path, seq, expected) in cases {
            assert_eq!(staging_key(path, seq), expected, "failed for case: {}", path);
        }
    }
}
