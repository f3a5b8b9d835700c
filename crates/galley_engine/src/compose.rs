use galley_base::error::ErrorKind;
use galley_base::pal::PalHandle;
use galley_base::{GalleyError, GalleyResult};
use tracing::debug;

use crate::config::SourceFiles;
use crate::styles::{StyleMap, extract_styles};

/// Key under which the extracted styles appear in the template data.
/// A key of the same name in the data file is replaced.
pub const STYLES_KEY: &str = "styles";

/// Render the document from the current contents of the source files.
///
/// The result is a pure function of the data, template and style files: the
/// data file is parsed as YAML, the extracted styles are merged in under
/// [`STYLES_KEY`], and the template is rendered with the combined data. On
/// success the document is also written to the output file; on any failure
/// nothing is written and the previous output file is left untouched.
pub fn render_document(pal: &PalHandle, sources: &SourceFiles) -> GalleyResult<String> {
    let data_text = pal.read_file_to_string(&sources.data)?;
    let template_text = pal.read_file_to_string(&sources.template)?;
    let style_text = pal.read_file_to_string(&sources.style)?;

    let styles = extract_styles(&style_text)?;
    let data = parse_data(&data_text)?;
    let globals = build_globals(data, &styles)?;
    let html = render_template(&template_text, &globals)?;

    pal.write_file(&sources.output, html.as_bytes())?;
    debug!(output = %sources.output, bytes = html.len(), "Document rendered");
    Ok(html)
}

/// Parse the data file. An empty file is treated as an empty mapping,
/// anything other than a mapping at the top level is rejected.
fn parse_data(text: &str) -> GalleyResult<serde_yaml::Mapping> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| data_error(e.to_string()))?;
    match value {
        serde_yaml::Value::Null => Ok(serde_yaml::Mapping::new()),
        serde_yaml::Value::Mapping(mapping) => Ok(mapping),
        other => Err(data_error(format!(
            "top level must be a mapping, found {}",
            yaml_type_name(&other)
        ))),
    }
}

/// Merge the styles into the data under [`STYLES_KEY`] and convert the whole
/// mapping into template globals.
fn build_globals(
    mut data: serde_yaml::Mapping,
    styles: &StyleMap,
) -> GalleyResult<liquid::Object> {
    let mut style_mapping = serde_yaml::Mapping::new();
    for (selector, declarations) in styles {
        style_mapping.insert(
            serde_yaml::Value::String(selector.clone()),
            serde_yaml::Value::String(declarations.clone()),
        );
    }
    data.insert(
        serde_yaml::Value::String(STYLES_KEY.to_string()),
        serde_yaml::Value::Mapping(style_mapping),
    );

    let value = liquid::model::to_value(&serde_yaml::Value::Mapping(data))
        .map_err(|e| data_error(format!("data cannot be used as template globals: {}", e)))?;
    match value {
        liquid::model::Value::Object(object) => Ok(object),
        _ => Err(data_error("data did not convert to an object".to_string())),
    }
}

fn render_template(text: &str, globals: &liquid::Object) -> GalleyResult<String> {
    let parser = liquid::ParserBuilder::with_stdlib()
        .build()
        .map_err(|e| template_error(e.to_string()))?;
    let template = parser.parse(text).map_err(|e| template_error(e.to_string()))?;
    template
        .render(globals)
        .map_err(|e| template_error(e.to_string()))
}

fn data_error(message: String) -> Box<GalleyError> {
    Box::new(GalleyError::new(ErrorKind::DataError { message }))
}

fn template_error(message: String) -> Box<GalleyError> {
    Box::new(GalleyError::new(ErrorKind::TemplateError { message }))
}

fn yaml_type_name(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use galley_base::pal::{FilePath, MockPal};

    fn setup(data: &str, template: &str, style: &str) -> (PalHandle, SourceFiles) {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data.yml"), data.as_bytes().to_vec());
        mock.add_file(FilePath::from("template.liquid"), template.as_bytes().to_vec());
        mock.add_file(FilePath::from("style.css"), style.as_bytes().to_vec());
        let sources = Config::default().source_files();
        (PalHandle::new(mock), sources)
    }

    #[test]
    fn test_render_combines_data_template_and_styles() {
        let (pal, sources) = setup(
            "heading: Hi\nbody: x\n",
            "<h1>{{heading}}</h1><div style=\"{{styles['.note']}}\">{{body}}</div>",
            ".note { color: red; }",
        );

        let html = render_document(&pal, &sources).unwrap();
        assert_eq!(html, "<h1>Hi</h1><div style=\"color: red;\">x</div>");
    }

    #[test]
    fn test_render_writes_output_file() {
        let (pal, sources) = setup("title: Hello\n", "<p>{{title}}</p>", "");

        let html = render_document(&pal, &sources).unwrap();

        let written = pal.read_file_to_string(&sources.output).unwrap();
        assert_eq!(written, html);
        assert_eq!(written, "<p>Hello</p>");
    }

    #[test]
    fn test_render_is_deterministic() {
        let (pal, sources) = setup(
            "title: Hello\n",
            "<p>{{title}}</p><span style=\"{{styles['em']}}\"></span>",
            "em { color: teal; font-style: italic; }",
        );

        let first = render_document(&pal, &sources).unwrap();
        let second = render_document(&pal, &sources).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_data_file_renders() {
        let (pal, sources) = setup("", "static text", "");

        let html = render_document(&pal, &sources).unwrap();
        assert_eq!(html, "static text");
    }

    #[test]
    fn test_missing_data_file_is_a_file_error() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("template.liquid"), b"x".to_vec());
        mock.add_file(FilePath::from("style.css"), b"".to_vec());
        let pal = PalHandle::new(mock);
        let sources = Config::default().source_files();

        let error = render_document(&pal, &sources).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::FileError { .. }));
    }

    #[test]
    fn test_invalid_yaml_is_a_data_error() {
        let (pal, sources) = setup("foo: [unclosed\n", "x", "");

        let error = render_document(&pal, &sources).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::DataError { .. }));
    }

    #[test]
    fn test_non_mapping_yaml_is_a_data_error() {
        let (pal, sources) = setup("- a\n- b\n", "x", "");

        let error = render_document(&pal, &sources).unwrap_err();
        match error.kind() {
            ErrorKind::DataError { message } => {
                assert!(message.contains("mapping"), "unexpected message: {}", message);
            }
            other => panic!("Expected DataError, got {:?}", other),
        }
    }

    #[test]
    fn test_styles_key_in_data_is_replaced() {
        let (pal, sources) = setup(
            "styles: from the data file\n",
            "{{styles['.x']}}",
            ".x { color: red; }",
        );

        let html = render_document(&pal, &sources).unwrap();
        assert_eq!(html, "color: red;");
    }

    #[test]
    fn test_template_parse_error_is_a_template_error() {
        let (pal, sources) = setup("title: x\n", "{% if %}", "");

        let error = render_document(&pal, &sources).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::TemplateError { .. }));
    }

    #[test]
    fn test_unknown_variable_is_a_template_error() {
        let (pal, sources) = setup("", "{{missing}}", "");

        let error = render_document(&pal, &sources).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::TemplateError { .. }));
    }

    #[test]
    fn test_style_error_stops_the_render() {
        let (pal, sources) = setup("title: x\n", "<p>{{title}}</p>", "h1 { color");

        let error = render_document(&pal, &sources).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::StyleError { .. }));
        assert!(!pal.file_exists(&sources.output).unwrap());
    }

    #[test]
    fn test_failed_render_leaves_previous_output_untouched() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data.yml"), b"title: first\n".to_vec());
        mock.add_file(FilePath::from("template.liquid"), b"<p>{{title}}</p>".to_vec());
        mock.add_file(FilePath::from("style.css"), b"".to_vec());
        let pal = PalHandle::new(mock.clone());
        let sources = Config::default().source_files();

        render_document(&pal, &sources).unwrap();
        assert_eq!(
            pal.read_file_to_string(&sources.output).unwrap(),
            "<p>first</p>"
        );

        // Break the template, the old artifact must survive the failed render
        mock.add_file(FilePath::from("template.liquid"), b"{% endfor %}".to_vec());
        let result = render_document(&pal, &sources);
        assert!(result.is_err());
        assert_eq!(
            pal.read_file_to_string(&sources.output).unwrap(),
            "<p>first</p>"
        );
    }

    #[test]
    fn test_unicode_content_flows_through() {
        let (pal, sources) = setup(
            "title: \"caffè ☕\"\n",
            "<h1>{{title}}</h1>",
            "",
        );

        let html = render_document(&pal, &sources).unwrap();
        assert_eq!(html, "<h1>caffè ☕</h1>");
    }
}
