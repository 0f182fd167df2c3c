//! Filter and DN value escaping.
//!
//! Filter templates use `{n}` placeholders, replaced by the n-th argument after
//! RFC 4515 escaping. DN patterns use RFC 4514 escaping.

/// Substitutes `{n}` placeholders in a filter template with escaped arguments.
///
/// Placeholders without a matching argument are left as they are.
///
/// ```
/// use actix_context_security::http::security::ldap::filter::format_filter;
///
/// assert_eq!(format_filter("(uid={0})", &["bob"]), "(uid=bob)");
/// assert_eq!(format_filter("(cn={0})", &["a*b"]), "(cn=a\\2ab)");
/// ```
pub fn format_filter<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let substituted = after.find('}').and_then(|end| {
            let index: usize = after[..end].parse().ok()?;
            let arg = args.get(index)?;
            Some((escape_filter_value(arg.as_ref()), end))
        });
        match substituted {
            Some((value, end)) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escapes a value for use inside a search filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\5c"),
            '*' => out.push_str("\\2a"),
            '(' => out.push_str("\\28"),
            ')' => out.push_str("\\29"),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_filter_value`].
pub fn unescape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some(byte) = value
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(char::from(byte));
                chars.next();
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Escapes a value for use as an attribute value in a DN (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            c => out.push(c),
        }
    }
    out
}
