use crate::host::{Theme, WebviewPanel};

pub const WIDGET_SCRIPT: &str = "jsoneditor.min.js";
pub const WIDGET_CSS: &str = "jsoneditor.min.css";
pub const WIDGET_DARK_CSS: &str = "jsoneditor.dark.min.css";
pub const SURFACE_SCRIPT: &str = "main.js";

/// Webview URIs of the files the shell links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellAssets {
    pub surface_script: String,
    pub widget_script: String,
    pub widget_css: String,
    pub widget_dark_css: String,
}

impl ShellAssets {
    pub fn resolve(panel: &impl WebviewPanel) -> Self {
        Self {
            surface_script: panel.asset_uri(SURFACE_SCRIPT),
            widget_script: panel.asset_uri(WIDGET_SCRIPT),
            widget_css: panel.asset_uri(WIDGET_CSS),
            widget_dark_css: panel.asset_uri(WIDGET_DARK_CSS),
        }
    }
}

pub fn render_shell(theme: Theme, assets: &ShellAssets) -> String {
    let dark_css = match theme {
        Theme::Dark => format!(
            r#"<link href="{}" rel="stylesheet" type="text/css">"#,
            assets.widget_dark_css
        ),
        Theme::Light => String::new(),
    };

    let body_style = match theme {
        Theme::Dark => "background-color: #1e1e1e; color: #fff;",
        Theme::Light => "background-color: #fff; color: #000;",
    };

    format!(
        r#"<!DOCTYPE HTML>
<html>
<head>
    <meta http-equiv="Content-Type" content="text/html;charset=utf-8">
    <link href="{widget_css}" rel="stylesheet" type="text/css">
    {dark_css}
    <script src="{widget_script}"></script>
</head>
<body style="{body_style}" data-theme="{theme}">
    <div id="jsoneditor"></div>
    <script src="{surface_script}"></script>
</body>
</html>
"#,
        widget_css = assets.widget_css,
        widget_script = assets.widget_script,
        surface_script = assets.surface_script,
        theme = theme.as_str(),
    )
}
