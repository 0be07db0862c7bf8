use super::*;

/// Renders a row set as `<root><row><column>..</column></row>..</root>`,
/// indented by three spaces. Null columns become empty elements.
pub(super) fn render_xml(root: &str, rows: &[ReportRow]) -> anyhow::Result<String> {
    let names = ElementNames::new()?;
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 3);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let root_name = names.element_name(root);
    writer.write_event(Event::Start(BytesStart::new(root_name.as_str())))?;

    for row in rows {
        writer.write_event(Event::Start(BytesStart::new("row")))?;
        for (column, value) in row {
            let name = names.element_name(column);
            match scalar_text(value) {
                None => writer.write_event(Event::Empty(BytesStart::new(name.as_str())))?,
                Some(text) => {
                    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                    writer.write_event(Event::Text(BytesText::new(&text)))?;
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }

    writer.write_event(Event::End(BytesEnd::new(root_name.as_str())))?;

    let mut rendered =
        String::from_utf8(writer.into_inner()).context("rendered xml is not valid UTF-8")?;
    rendered.push('\n');
    Ok(rendered)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

struct ElementNames {
    invalid: Regex,
}

impl ElementNames {
    fn new() -> anyhow::Result<Self> {
        let invalid = Regex::new(r"[^A-Za-z0-9_.\-]").context("failed to compile xml name regex")?;
        Ok(Self { invalid })
    }

    /// Replaces characters not allowed in XML names and prefixes names that
    /// cannot start an element.
    fn element_name(&self, raw: &str) -> String {
        let cleaned = self.invalid.replace_all(raw, "_").into_owned();
        let starts_ok = cleaned
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
        let reserved = cleaned.to_ascii_lowercase().starts_with("xml");

        if starts_ok && !reserved {
            cleaned
        } else {
            format!("_{cleaned}")
        }
    }
}
