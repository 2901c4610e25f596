//! Raw-text transforms applied around the tree: stripping tags the tree
//! builder should never see, and the entity-safe output encoding.

/// Removes every opening, closing or self-closing tag whose name is in
/// `tags` (ASCII case-insensitive). Content between tags is kept.
pub fn strip_tags(html: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return html.to_string();
    }
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let candidate = &rest[lt..];
        match tag_extent(candidate, tags) {
            Some(len) => rest = &candidate[len..],
            None => {
                out.push('<');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Length of the tag at the start of `text` when its name is listed.
fn tag_extent(text: &str, tags: &[String]) -> Option<usize> {
    let after = &text[1..];
    let name_start = if after.starts_with('/') { 2 } else { 1 };
    let name_len = text[name_start..]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(text.len() - name_start);
    let name = &text[name_start..name_start + name_len];
    if name.is_empty() || !tags.iter().any(|tag| tag.eq_ignore_ascii_case(name)) {
        return None;
    }
    let boundary_ok = match text[name_start + name_len..].chars().next() {
        None | Some('>' | '/') => true,
        Some(c) => c.is_whitespace(),
    };
    if !boundary_ok {
        return None;
    }
    text.find('>').map(|gt| gt + 1).or(Some(text.len()))
}

/// Writes non-ASCII characters as numeric character references, leaving
/// the raw text of `<style>` and `<script>` elements untouched. Tags are
/// scanned with their quoted attribute values, so markup-like text inside
/// an attribute never switches to raw text.
pub fn encode_entities(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        push_encoded(&mut out, &rest[..lt]);
        rest = &rest[lt..];
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->").map(|i| i + 3).unwrap_or(body.len());
            out.push_str("<!--");
            push_encoded(&mut out, &body[..end]);
            rest = &body[end..];
            continue;
        }
        let Some(tag_len) = tag_length(rest) else {
            out.push('<');
            rest = &rest[1..];
            continue;
        };
        let tag = &rest[..tag_len];
        push_encoded(&mut out, tag);
        rest = &rest[tag_len..];
        if let Some(name) = raw_text_element(tag) {
            let raw_end = find_end_tag(rest, name).unwrap_or(rest.len());
            out.push_str(&rest[..raw_end]);
            rest = &rest[raw_end..];
        }
    }
    push_encoded(&mut out, rest);
    out
}

/// Length of the tag starting at `text[0] == '<'`, quoted values included.
/// `None` when the `<` does not open a tag.
fn tag_length(text: &str) -> Option<usize> {
    let mut head = text[1..].chars();
    match head.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '!' || c == '?' => {}
        Some('/') if head.next().is_some_and(|c| c.is_ascii_alphabetic()) => {}
        _ => return None,
    }
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices().skip(1) {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => return Some(idx + 1),
            None => {}
        }
    }
    Some(text.len())
}

/// Name of the raw-text element a start tag opens, if any.
fn raw_text_element(tag: &str) -> Option<&'static str> {
    let name_end = tag[1..]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .map(|i| i + 1)
        .unwrap_or(tag.len());
    let name = &tag[1..name_end];
    if name.eq_ignore_ascii_case("style") {
        Some("style")
    } else if name.eq_ignore_ascii_case("script") {
        Some("script")
    } else {
        None
    }
}

fn find_end_tag(text: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    let mut from = 0usize;
    while let Some(offset) = find_ascii_case_insensitive(&text[from..], &needle) {
        let start = from + offset;
        let after = &text[start + needle.len()..];
        if after.is_empty() || after.starts_with(|c: char| c == '>' || c == '/' || c.is_whitespace()) {
            return Some(start);
        }
        from = start + needle.len();
    }
    None
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn push_encoded(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&format!("&#{};", ch as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn strips_listed_tags_in_any_form() {
        let html = "<p>long<wbr>word<WBR/>break<wbr class=\"x\"></wbr></p>";
        assert_eq!(strip_tags(html, &tags(&["wbr"])), "<p>longwordbreak</p>");
    }

    #[test]
    fn keeps_tags_sharing_a_prefix() {
        let html = "<wbrx>a</wbrx><b>c</b>";
        assert_eq!(strip_tags(html, &tags(&["wbr", "b"])), "<wbrx>a</wbrx>c");
        assert_eq!(strip_tags("a < b", &tags(&["b"])), "a < b");
    }

    #[test]
    fn encodes_non_ascii_outside_raw_text() {
        let html = "<p title=\"café\">naïve</p><style>p:after{content:\"é\"}</style><p>ü</p>";
        assert_eq!(
            encode_entities(html),
            "<p title=\"caf&#233;\">na&#239;ve</p><style>p:after{content:\"é\"}</style><p>&#252;</p>"
        );
    }

    #[test]
    fn ascii_is_untouched() {
        let html = "<html><body><p>plain &amp; simple</p></body></html>";
        assert_eq!(encode_entities(html), html);
    }

    #[test]
    fn markup_inside_attributes_does_not_start_raw_text() {
        assert_eq!(
            encode_entities("<p title=\"<style>\">x</p><p>café</p>"),
            "<p title=\"<style>\">x</p><p>caf&#233;</p>"
        );
        assert_eq!(
            encode_entities("<!-- <script> é --><p>ü</p><SCRIPT>var s = \"ö\";</SCRIPT>ä"),
            "<!-- <script> &#233; --><p>&#252;</p><SCRIPT>var s = \"ö\";</SCRIPT>&#228;"
        );
    }
}
