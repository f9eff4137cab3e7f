use toolrun_core::SpawnError;

/// Split a command-line string into argv.
///
/// Whitespace separates arguments, `"..."` and `'...'` group, and a backslash
/// escapes the next character outside single quotes. Inside double quotes only
/// `\"` and `\\` are escapes. No variable expansion, globbing or operators.
pub fn split_arguments(line: &str) -> Result<Vec<String>, SpawnError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(SpawnError::InvalidArguments(format!(
                                "unterminated single quote in `{}`",
                                line
                            )))
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(SpawnError::InvalidArguments(format!(
                                "unterminated double quote in `{}`",
                                line
                            )))
                        }
                    }
                }
            }
            '\\' => {
                in_token = true;
                // A trailing backslash is kept literally.
                current.push(chars.next().unwrap_or('\\'));
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    Ok(args)
}
