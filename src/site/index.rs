//! Generated `index.html`.

use crate::utils::html::escape;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fmt::Write;
use std::path::{Component, Path};

/// Characters escaped in href path segments.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Render a page listing for `pages` (source-relative, already sorted).
pub fn render<P: AsRef<Path>>(pages: &[P]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index</title></head>\n<body>\n<ul>\n",
    );
    for page in pages {
        let label = slash_path(page.as_ref());
        let href = href(page.as_ref());
        let _ = writeln!(html, "<li><a href=\"{}\">{}</a></li>", escape(&href), escape(&label));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// `/`-separated display form, independent of the platform separator.
fn slash_path(path: &Path) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

fn href(path: &Path) -> String {
    segments(path)
        .map(|segment| utf8_percent_encode(&segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn segments(path: &Path) -> impl Iterator<Item = String> + '_ {
    path.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    })
}
