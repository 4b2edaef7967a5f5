//! HTML rendering / 页面渲染
//!
//! Templates are compiled into the binary. `.html` templates auto-escape,
//! which covers the markup Wikipedia puts in snippets.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use minijinja::{Environment, Value};
use serde::Serialize;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("search.html", include_str!("../templates/search.html")),
    ("about.html", include_str!("../templates/about.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("weather.html", include_str!("../templates/weather.html")),
];

/// Values every page gets on top of its own
#[derive(Serialize)]
struct PageContext<'a, T: Serialize> {
    title: &'a str,
    logged_in: bool,
    #[serde(flatten)]
    data: T,
}

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        env.add_global("build_time", whoknows::BUILD_TIME);
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }

    /// Render `name` with the shared page context merged in. Template
    /// failures are logged and answered with a bare 500.
    pub fn page<T: Serialize>(
        &self,
        status: StatusCode,
        name: &str,
        title: &str,
        logged_in: bool,
        data: T,
    ) -> Response {
        let ctx = PageContext { title, logged_in, data };
        match self.render(name, Value::from_serialize(&ctx)) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render template {}: {:#}", name, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
            }
        }
    }
}
