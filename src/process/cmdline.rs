/*!
 * Windows Command Line
 *
 * Argument quoting and environment block serialization for CreateProcessW.
 * Pure string transformations, built on every platform so the rules can
 * be tested anywhere.
 */

use std::collections::BTreeMap;

/// Characters that force quoting of any argument
const ALWAYS_QUOTE: &[char] = &[' ', '\t', '\n', '\u{0b}', '"'];

/// Characters cmd.exe interprets when the program is a batch file
const BATCH_QUOTE: &[char] = &['&', '|', '<', '>', '(', ')', '^', '%', '!', ',', ';', '='];

/// Program is run through cmd.exe
pub fn is_batch_file(program: &str) -> bool {
    let lower = program.to_ascii_lowercase();
    lower.ends_with(".bat") || lower.ends_with(".cmd")
}

/// Argument must be wrapped in quotes
pub fn needs_quoting(arg: &str, batch: bool) -> bool {
    arg.is_empty()
        || arg.contains(ALWAYS_QUOTE)
        || (batch && arg.contains(BATCH_QUOTE))
}

/// Append one argument using the MSVC argv rules
///
/// Inside quotes, a run of backslashes is doubled only when it is followed
/// by a `"` or by the closing quote; a `"` becomes `\"`.
pub fn append_arg(out: &mut String, arg: &str, batch: bool) {
    if !needs_quoting(arg, batch) {
        out.push_str(arg);
        return;
    }

    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                push_backslashes(out, backslashes * 2 + 1);
                out.push('"');
                backslashes = 0;
            }
            _ => {
                push_backslashes(out, backslashes);
                out.push(c);
                backslashes = 0;
            }
        }
    }
    push_backslashes(out, backslashes * 2);
    out.push('"');
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat('\\').take(count));
}

/// Quote a single argument
pub fn quote_arg(arg: &str, batch: bool) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    append_arg(&mut out, arg, batch);
    out
}

/// Serialize an argument vector into one command line
pub fn build_command_line(args: &[String]) -> String {
    let batch = args.first().map_or(false, |program| is_batch_file(program));
    let mut line = String::new();
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            line.push(' ');
        }
        append_arg(&mut line, arg, batch);
    }
    line
}

/// UTF-16 `KEY=VALUE\0...\0\0` block, `None` to inherit the parent's
///
/// Entries are ordered case-insensitively, as CreateProcessW expects.
pub fn build_environment_block(environment: &BTreeMap<String, String>) -> Option<Vec<u16>> {
    if environment.is_empty() {
        return None;
    }

    let mut entries: Vec<(&String, &String)> = environment.iter().collect();
    entries.sort_by_cached_key(|(key, _)| key.to_uppercase());

    let mut block = Vec::new();
    for (key, value) in entries {
        block.extend(key.encode_utf16());
        block.push('=' as u16);
        block.extend(value.encode_utf16());
        block.push(0);
    }
    block.push(0);
    Some(block)
}
