//! Delimited export collaborator.
//! Pure formatting: an ordered sequence of records in, a CSV byte stream out.
//! No business rules live here; callers decide what to export and in what order.

/// Render a header row plus data rows as RFC-4180 style CSV with CRLF line ends.
pub fn to_csv(header: &[&str], rows: &[Vec<String>]) -> Vec<u8> {
    let mut out = String::new();
    push_row(&mut out, header.iter().map(|s| s.to_string()));
    for row in rows {
        push_row(&mut out, row.iter().cloned());
    }
    out.into_bytes()
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        let bytes = to_csv(&["Name", "Unit"], &[vec!["Ada".into(), "Eng".into()]]);
        assert_eq!(String::from_utf8(bytes).unwrap(), "Name,Unit\r\nAda,Eng\r\n");
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let bytes = to_csv(
            &["Title"],
            &[vec!["Hello, \"World\"".into()], vec!["line\nbreak".into()]],
        );
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Title\r\n\"Hello, \"\"World\"\"\"\r\n\"line\nbreak\"\r\n");
    }

    #[test]
    fn empty_rows_produce_header_only() {
        let bytes = to_csv(&["A", "B"], &[]);
        assert_eq!(String::from_utf8(bytes).unwrap(), "A,B\r\n");
    }
}
