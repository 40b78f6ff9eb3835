//! Page templates, loaded from `<STATIC_RESOURCES_PATH>/template`.

use std::path::Path;
use std::sync::Arc;

use minijinja::{Environment, context, path_loader};
use tracing::info;

use crate::sunlight::Vote;
use crate::tally::VoteTally;

pub const INDEX_TEMPLATE: &str = "index.html";

/// Shared template environment.
///
/// Templates are read from disk on first use and cached afterwards.
#[derive(Clone)]
pub struct Templates {
    env: Arc<Environment<'static>>,
}

impl Templates {
    /// Create the environment and make sure every page template parses.
    ///
    /// # Errors
    ///
    /// Returns the loader or syntax error of the first template that fails.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, minijinja::Error> {
        let dir = dir.as_ref();
        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        env.get_template(INDEX_TEMPLATE)?;
        info!(dir = %dir.display(), "Templates loaded");

        Ok(Self { env: Arc::new(env) })
    }

    /// Render the index page for one vote.
    ///
    /// # Errors
    ///
    /// Returns the template's render error.
    pub fn render_index(&self, vote: &Vote, tally: &VoteTally) -> Result<String, minijinja::Error> {
        self.env
            .get_template(INDEX_TEMPLATE)?
            .render(context! { vote, tally, subject => vote.subject() })
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn template_dir(source: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_TEMPLATE), source).unwrap();
        dir
    }

    #[test]
    fn test_render_index() {
        let dir = template_dir(
            "{{ vote.roll_id }}|{% for name, o in tally.options|items %}{{ name }}={{ o.senators }};{% endfor %}",
        );
        let templates = Templates::load(dir.path()).unwrap();
        let vote = Vote {
            roll_id: "s396-2009".to_string(),
            ..Vote::default()
        };
        let mut tally = VoteTally::default();
        tally.options.insert(
            "Yea".to_string(),
            crate::tally::OptionTally {
                senators: 60,
                ..Default::default()
            },
        );

        let html = templates.render_index(&vote, &tally).unwrap();

        assert_eq!(html, "s396-2009|Yea=60;");
    }

    #[test]
    fn test_output_is_escaped() {
        let dir = template_dir("{{ vote.question }}");
        let templates = Templates::load(dir.path()).unwrap();
        let vote = Vote {
            question: "<script>".to_string(),
            ..Vote::default()
        };

        let html = templates
            .render_index(&vote, &VoteTally::default())
            .unwrap();

        assert_eq!(html, "&lt;script&gt;");
    }

    #[test]
    fn test_missing_template_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Templates::load(dir.path()).is_err());
    }

    #[test]
    fn test_syntax_error_fails_load() {
        let dir = template_dir("{% for %}");
        assert!(Templates::load(dir.path()).is_err());
    }
}
