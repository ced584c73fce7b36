//! HTML page rendering

use crate::logic::layout::{FeatureKind, FEATURE_SPECS};
use crate::logic::session::{ExplanationView, ResultView, View};

/// Banner shown above the results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

pub fn page(title: &str, view: &View, banner: Option<&Banner>) -> String {
    let mut html = String::with_capacity(8192);

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<h1>{title}</h1>
"#,
        title = escape(title),
        STYLE = STYLE
    ));

    html.push_str(&form(view));

    match banner {
        Some(Banner::Success(msg)) => html.push_str(&format!(r#"<p class="banner success">{}</p>"#, escape(msg))),
        Some(Banner::Error(msg)) => html.push_str(&format!(r#"<p class="banner error">{}</p>"#, escape(msg))),
        None => {}
    }

    match &view.result {
        None => html.push_str(r#"<p class="banner info">👉 Please click <strong>Predict</strong> to generate a prediction.</p>"#),
        Some(result) => html.push_str(&results(result)),
    }

    html.push_str("\n</main>\n</body>\n</html>\n");
    html
}

fn form(view: &View) -> String {
    let mut html = String::from(
        r#"<form method="post" action="/predict" class="card">
<h2>Enter patient information</h2>
"#,
    );

    for (spec, value) in FEATURE_SPECS.iter().zip(view.form_values.as_slice()) {
        match spec.kind {
            FeatureKind::Continuous { min, max, .. } => {
                html.push_str(&format!(
                    r#"<label>{label}: <input type="number" name="{name}" min="{min}" max="{max}" step="1" value="{value}" required></label>
"#,
                    label = escape(spec.label),
                    name = spec.name,
                    min = min,
                    max = max,
                    value = value
                ));
            }
            FeatureKind::Binary { .. } => {
                let yes = *value == 1.0;
                html.push_str(&format!(
                    r#"<label>{label}: <select name="{name}"><option value="0"{no_sel}>No</option><option value="1"{yes_sel}>Yes</option></select></label>
"#,
                    label = escape(spec.label),
                    name = spec.name,
                    no_sel = if yes { "" } else { " selected" },
                    yes_sel = if yes { " selected" } else { "" }
                ));
            }
        }
    }

    html.push_str("<button type=\"submit\">Predict</button>\n</form>\n");
    html
}

fn results(result: &ResultView) -> String {
    let mut html = format!(
        r#"<section class="card">
<h2>Prediction result</h2>
<p><strong>Predicted class:</strong> {label}</p>
<p><strong>Probability of disease:</strong> {percent:.2}%</p>
<p class="advice">{advice}</p>
<h2>SHAP force plot</h2>
"#,
        label = result.class_label,
        percent = result.positive_percent,
        advice = escape(&result.advice)
    );

    match &result.explanation {
        ExplanationView::Inline(svg) => {
            html.push_str(r#"<div class="plot">"#);
            html.push_str(svg);
            html.push_str("</div>\n");
        }
        ExplanationView::Image { version } => {
            html.push_str(&format!(
                r#"<div class="plot"><img src="/explanation.svg?v={}" alt="SHAP force plot"></div>"#,
                version
            ));
            html.push('\n');
        }
        ExplanationView::Unavailable(reason) => {
            html.push_str(&format!(
                r#"<p class="banner error">The explanation could not be generated: {}</p>"#,
                escape(reason)
            ));
            html.push('\n');
        }
    }

    html.push_str(&format!(
        r#"<p class="caption">SHAP explanation is for the "disease" class (class 1); predicted probability of disease {:.2}%.</p>
<form method="post" action="/reset"><button type="submit" class="primary">Clear prediction</button></form>
</section>
"#,
        result.positive_percent
    ));

    html
}

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = "body{font-family:Arial,sans-serif;background:#fafafa;color:#222;margin:0}\
main{max-width:920px;margin:0 auto;padding:24px}\
.card{background:#fff;border:1px solid #e3e3e3;border-radius:8px;padding:16px 20px;margin:16px 0}\
label{display:block;margin:8px 0}\
input,select{margin-left:8px;padding:4px}\
button{padding:6px 16px;border-radius:6px;border:1px solid #bbb;background:#fff;cursor:pointer}\
button.primary{background:#ff4b4b;color:#fff;border-color:#ff4b4b}\
.banner{padding:10px 14px;border-radius:6px}\
.info{background:#e8f1fb}.success{background:#e6f4ea}.error{background:#fdecea}\
.plot{overflow-x:auto}.caption{color:#666;font-size:0.9em}";
