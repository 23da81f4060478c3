//! HTML rendering for the attendance form and its results.

use rollcall_attendance::ROSTER_FILE_NAME;
use std::fmt::Write as _;

use crate::form::{FormState, Report};

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2rem auto;padding:0 1rem}\
.warning{background:#fff3cd;padding:.75rem}.error{background:#f8d7da;padding:.75rem}\
img{width:100%;margin:1rem 0}label{display:block;margin:.75rem 0 .25rem}";

/// Escape text for HTML element content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the whole page: form, notices, then whatever `state` carries.
pub fn render(state: &FormState, gallery_path: &str, notices: &[String]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Class Attendance App</title>\
<style>{STYLE}</style></head><body><h1>Class Attendance App</h1><p>Upload images to mark attendance</p>\
<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
<label for=\"gallery_path\">Enter the path to student images database:</label>\
<input type=\"text\" id=\"gallery_path\" name=\"gallery_path\" size=\"60\" value=\"{}\">\
<label for=\"images\">Choose images</label>\
<input type=\"file\" id=\"images\" name=\"images\" multiple accept=\".jpg,.jpeg,.png\">\
<p><button type=\"submit\">Process</button></p></form>",
        escape(gallery_path)
    );

    for notice in notices {
        let _ = write!(html, "<p class=\"warning\">{}</p>", escape(notice));
    }

    match state {
        FormState::Idle { warning } => {
            let _ = write!(html, "<p class=\"warning\">{}</p>", escape(warning));
        }
        FormState::Rejected { error } => {
            let _ = write!(html, "<p class=\"error\">{}</p>", escape(error));
        }
        FormState::Presenting(report) => render_report(&mut html, report),
    }

    html.push_str("</body></html>");
    html
}

fn render_report(html: &mut String, report: &Report) {
    let summary = &report.summary;
    let _ = write!(
        html,
        "<p>Processing {} images...</p>\
<p>Total faces detected: {}</p><p>Recognized faces: {}</p><p>Unknown faces: {}</p>",
        report.image_count,
        summary.total_faces,
        summary.recognized(),
        summary.unknown_faces
    );

    for error in &report.errors {
        let _ = write!(html, "<p class=\"error\">{}</p>", escape(error));
    }

    match &report.roster_url {
        Some(url) if !report.names.is_empty() => {
            html.push_str("<p>Attendance Marked for:</p><ul>");
            for name in &report.names {
                let _ = write!(html, "<li>{}</li>", escape(name));
            }
            let _ = write!(
                html,
                "</ul><p><a href=\"{}\" download=\"{ROSTER_FILE_NAME}\">Download Attendance</a></p>",
                escape(url)
            );
        }
        _ => html.push_str("<p>No faces recognized</p>"),
    }

    for image in &report.images {
        let _ = write!(
            html,
            "<img src=\"{}\" alt=\"{}\">",
            escape(&image.data_url),
            escape(&image.file_name)
        );
    }
}
