//! Command-line codec
//!
//! Converts between an argument list and the single command-line string
//! that `CreateProcessW` expects. The encoding follows the quoting rules of
//! the Microsoft C runtime so the child's own argv parsing gets back exactly
//! the arguments we were given.

/// Characters that force an argument to be quoted
const SPECIAL_CHARS: [char; 5] = [' ', '\t', '\n', '\u{0B}', '"'];

/// Join arguments into one command line, quoting where required
pub fn encode<S: AsRef<str>>(args: &[S]) -> String {
    let mut output = String::new();

    for arg in args {
        if !output.is_empty() {
            output.push(' ');
        }
        append_argument(&mut output, arg.as_ref());
    }

    output
}

/// Append a single argument to `output` using the runtime's escaping rules
fn append_argument(output: &mut String, arg: &str) {
    if !arg.is_empty() && !arg.contains(&SPECIAL_CHARS[..]) {
        output.push_str(arg);
        return;
    }

    output.push('"');

    let mut chars = arg.chars().peekable();
    loop {
        let mut backslashes = 0usize;
        while chars.peek() == Some(&'\\') {
            chars.next();
            backslashes += 1;
        }

        match chars.next() {
            None => {
                // Backslashes before the closing quote must be doubled
                push_backslashes(output, backslashes * 2);
                break;
            }
            Some('"') => {
                push_backslashes(output, backslashes * 2 + 1);
                output.push('"');
            }
            Some(c) => {
                push_backslashes(output, backslashes);
                output.push(c);
            }
        }
    }

    output.push('"');
}

fn push_backslashes(output: &mut String, count: usize) {
    output.extend(std::iter::repeat('\\').take(count));
}

/// Split a command line into arguments
///
/// Mirrors the C runtime tokenizer for everything after the program name:
/// - unquoted space/tab separates arguments
/// - `2n` backslashes + `"` give `n` backslashes and toggle quoting
/// - `2n+1` backslashes + `"` give `n` backslashes and a literal `"`
/// - backslashes not followed by `"` are literal
/// - `""` inside a quoted region is a literal `"`
pub fn decode(cmdline: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    let mut chars = cmdline.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' if !in_quotes => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\\' => {
                in_token = true;
                let mut backslashes = 1usize;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    backslashes += 1;
                }

                if chars.peek() == Some(&'"') {
                    push_backslashes(&mut current, backslashes / 2);
                    if backslashes % 2 == 1 {
                        chars.next();
                        current.push('"');
                    }
                } else {
                    push_backslashes(&mut current, backslashes);
                }
            }
            '"' => {
                in_token = true;
                if in_quotes && chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        args.push(current);
    }

    args
}
