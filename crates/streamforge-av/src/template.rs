//! Variable substitution for tool argument templates.

use std::collections::HashMap;
use std::path::Path;

use crate::Rendition;

/// Placeholder that expands into one argument per list entry.
pub const INPUTS_PLACEHOLDER: &str = "{inputs}";

/// Variable substitution context for argument templates.
///
/// Templates are argument vectors, never shell strings: each template entry
/// becomes exactly one argument (except [`INPUTS_PLACEHOLDER`]), so a path
/// containing spaces or quotes cannot split into extra arguments.
///
/// # Example
///
/// ```
/// use streamforge_av::TemplateContext;
/// use std::path::Path;
///
/// let ctx = TemplateContext::new()
///     .with_input(Path::new("/videos/7/42/video.mp4"))
///     .with_var("bitrate", "750");
///
/// assert_eq!(ctx.substitute("-b:v {bitrate}k"), "-b:v 750k");
/// assert_eq!(ctx.substitute("{input}"), "/videos/7/42/video.mp4");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
    inputs: Vec<String>,
}

impl TemplateContext {
    /// Create a new empty template context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `{input}`.
    pub fn with_input(self, input: &Path) -> Self {
        self.with_path("input", input)
    }

    /// Set `{output}`.
    pub fn with_output(self, output: &Path) -> Self {
        self.with_path("output", output)
    }

    /// Set `{output_dir}`.
    pub fn with_output_dir(self, dir: &Path) -> Self {
        self.with_path("output_dir", dir)
    }

    /// Set `{workdir}`.
    pub fn with_workdir(self, dir: &Path) -> Self {
        self.with_path("workdir", dir)
    }

    /// Set `{name}`, `{width}`, `{height}` and `{bitrate}` (kbps) from a rendition.
    pub fn with_rendition(mut self, rendition: &Rendition) -> Self {
        self.set("name", &rendition.name);
        self.set("width", &rendition.width.to_string());
        self.set("height", &rendition.height.to_string());
        self.set("bitrate", &rendition.bitrate_kbps.to_string());
        self
    }

    /// Set the list that `{inputs}` expands to.
    pub fn with_inputs<P: AsRef<Path>>(mut self, inputs: &[P]) -> Self {
        self.inputs = inputs
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect();
        self
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable.
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    fn with_path(mut self, key: &str, path: &Path) -> Self {
        self.set(key, &path.display().to_string());
        self
    }

    /// Substitute variables in a string.
    ///
    /// Variables are in the form `{varname}`; unknown names are left as-is.
    /// Substituted values are not scanned again.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match self.vars.get(key) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push('{');
                            result.push_str(key);
                            result.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    result.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Expand a template argument vector.
    pub fn expand(&self, templates: &[String]) -> Vec<String> {
        let mut args = Vec::with_capacity(templates.len() + self.inputs.len());
        for template in templates {
            if template == INPUTS_PLACEHOLDER {
                args.extend(self.inputs.iter().cloned());
            } else {
                args.push(self.substitute(template));
            }
        }
        args
    }
}
