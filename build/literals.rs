/// The code on one source line with the contents of string and char literals
/// and any trailing `//` comment removed. Literal delimiters are kept, so
/// `let x = "a_b";` becomes `let x = "";`.
///
/// Works line by line: the continuation lines of a multi-line string are
/// treated as code.
pub fn code_outside_literals(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut code = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '"' => {
                // No escapes inside r"..." and r#"..."#.
                let raw = i > 0 && matches!(chars[i - 1], 'r' | '#');
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    i += if !raw && chars[i] == '\\' { 2 } else { 1 };
                }
                code.push_str("\"\"");
            }
            '\'' if chars.get(i + 1) == Some(&'\\') => {
                i += 3;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
                code.push_str("''");
            }
            '\'' if chars.get(i + 2) == Some(&'\'') => {
                i += 2;
                code.push_str("''");
            }
            _ => code.push(c),
        }
        i += 1;
    }
    code
}
