//! Force plot rendering
//!
//! Builds the SHAP force plot as SVG markup in memory. The same markup is
//! embedded inline in the page or served as `image/svg+xml`.

use super::types::{Explanation, FeatureContribution};

const WIDTH: f64 = 860.0;
const HEIGHT: f64 = 170.0;
const MARGIN: f64 = 30.0;
const BAR_Y: f64 = 70.0;
const BAR_HEIGHT: f64 = 26.0;

const POSITIVE_COLOR: &str = "#ff0d57";
const NEGATIVE_COLOR: &str = "#1e88e5";

/// Segment of the plot, in raw-output coordinates
#[derive(Debug, Clone, PartialEq)]
struct Segment<'a> {
    start: f64,
    end: f64,
    contribution: &'a FeatureContribution,
}

/// Positive contributions stack up to f(x) from the left, negative ones
/// stack down to f(x) from the right.
fn layout(explanation: &Explanation) -> (Vec<Segment<'_>>, Vec<Segment<'_>>) {
    let ranked = explanation.ranked();
    let fx = explanation.output_value;

    let mut positive = Vec::new();
    let mut cursor = fx;
    for c in ranked.iter().filter(|c| c.shap_value > 0.0) {
        positive.push(Segment { start: cursor - c.shap_value, end: cursor, contribution: c });
        cursor -= c.shap_value;
    }

    let mut negative = Vec::new();
    let mut cursor = fx;
    for c in ranked.iter().filter(|c| c.shap_value < 0.0) {
        negative.push(Segment { start: cursor, end: cursor - c.shap_value, contribution: c });
        cursor -= c.shap_value;
    }

    (positive, negative)
}

pub fn force_plot_svg(explanation: &Explanation) -> String {
    let (positive, negative) = layout(explanation);

    let mut lo = explanation.base_value.min(explanation.output_value);
    let mut hi = explanation.base_value.max(explanation.output_value);
    for s in positive.iter().chain(negative.iter()) {
        lo = lo.min(s.start);
        hi = hi.max(s.end);
    }
    let pad = ((hi - lo) * 0.1).max(0.05);
    lo -= pad;
    hi += pad;

    let scale = (WIDTH - 2.0 * MARGIN) / (hi - lo);
    let px = |v: f64| MARGIN + (v - lo) * scale;

    let mut svg = String::with_capacity(4096);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}" font-family="Arial, sans-serif" font-size="12" role="img" aria-label="SHAP force plot">"#,
        w = WIDTH,
        h = HEIGHT
    ));

    // axis + ticks
    svg.push_str(&format!(
        r##"<line x1="{}" y1="50" x2="{}" y2="50" stroke="#ccc"/>"##,
        MARGIN,
        WIDTH - MARGIN
    ));
    for i in 0..=5 {
        let v = lo + (hi - lo) * i as f64 / 5.0;
        svg.push_str(&format!(
            r##"<line x1="{x:.1}" y1="46" x2="{x:.1}" y2="54" stroke="#ccc"/><text x="{x:.1}" y="42" text-anchor="middle" fill="#999">{v:.2}</text>"##,
            x = px(v),
            v = v
        ));
    }

    for (segments, color) in [(&positive, POSITIVE_COLOR), (&negative, NEGATIVE_COLOR)] {
        for s in segments.iter() {
            let x = px(s.start);
            let width = (px(s.end) - x).max(0.5);
            svg.push_str(&format!(
                r#"<rect x="{:.1}" y="{}" width="{:.1}" height="{}" fill="{}" stroke="white" stroke-width="1"><title>{} ({:+.4})</title></rect>"#,
                x,
                BAR_Y,
                width,
                BAR_HEIGHT,
                color,
                escape(&label(s.contribution)),
                s.contribution.shap_value
            ));

            // label only segments wide enough to hold it
            if width > 40.0 {
                svg.push_str(&format!(
                    r#"<text x="{:.1}" y="{}" text-anchor="middle" fill="{}">{}</text>"#,
                    x + width / 2.0,
                    BAR_Y + BAR_HEIGHT + 18.0,
                    color,
                    escape(&label(s.contribution))
                ));
            }
        }
    }

    let base_x = px(explanation.base_value);
    svg.push_str(&format!(
        r##"<line x1="{x:.1}" y1="{top}" x2="{x:.1}" y2="{bottom}" stroke="#777" stroke-dasharray="4,3"/><text x="{x:.1}" y="{label_y}" text-anchor="middle" fill="#777">base value {v:.3}</text>"##,
        x = base_x,
        top = BAR_Y - 8.0,
        bottom = BAR_Y + BAR_HEIGHT + 8.0,
        label_y = HEIGHT - 10.0,
        v = explanation.base_value
    ));

    let fx_x = px(explanation.output_value);
    svg.push_str(&format!(
        r##"<text x="{x:.1}" y="24" text-anchor="middle" font-weight="bold" fill="#333">f(x) = {v:.3}</text><line x1="{x:.1}" y1="30" x2="{x:.1}" y2="{bottom}" stroke="#333"/>"##,
        x = fx_x,
        v = explanation.output_value,
        bottom = BAR_Y + BAR_HEIGHT
    ));

    svg.push_str(&format!(
        r##"<text x="{}" y="{}" fill="{}">higher ⇢</text><text x="{}" y="{}" text-anchor="end" fill="{}">⇠ lower</text>"##,
        MARGIN,
        BAR_Y - 12.0,
        POSITIVE_COLOR,
        WIDTH - MARGIN,
        BAR_Y - 12.0,
        NEGATIVE_COLOR
    ));

    svg.push_str("</svg>");
    svg
}

fn label(c: &FeatureContribution) -> String {
    format!("{} = {}", c.name, format_value(c.value))
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::Link;

    fn contribution(name: &str, value: f64, shap_value: f64) -> FeatureContribution {
        FeatureContribution { name: name.to_string(), value, shap_value }
    }

    fn explanation() -> Explanation {
        let contributions = vec![
            contribution("X1", 2.0, 0.8),
            contribution("X10", -1.5, -0.3),
            contribution("X18", 1.0, 0.2),
            contribution("X29", 0.0, 0.0),
        ];
        Explanation {
            base_value: -0.5,
            output_value: 0.2,
            link: Link::Logistic,
            probability: Link::Logistic.apply(0.2),
            contributions,
        }
    }

    #[test]
    fn test_layout_stacks_to_output() {
        let e = explanation();
        let (positive, negative) = layout(&e);

        assert_eq!(positive.len(), 2);
        assert_eq!(negative.len(), 1);

        // largest positive touches f(x)
        assert_eq!(positive[0].contribution.name, "X1");
        assert!((positive[0].end - 0.2).abs() < 1e-12);
        assert!((positive[1].start - (0.2 - 1.0)).abs() < 1e-12);

        assert!((negative[0].start - 0.2).abs() < 1e-12);
        assert!((negative[0].end - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_svg_markup() {
        let svg = force_plot_svg(&explanation());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("X1 = 2"));
        assert!(svg.contains("X10 = -1.50"));
        assert!(svg.contains("f(x) = 0.200"));
        assert!(svg.contains("base value -0.500"));
        assert!(svg.contains(POSITIVE_COLOR));
        assert!(svg.contains(NEGATIVE_COLOR));
        // zero contributions are not drawn
        assert!(!svg.contains("X29 = 0"));
    }

    #[test]
    fn test_flat_explanation_renders() {
        let e = Explanation {
            base_value: 0.3,
            output_value: 0.3,
            link: Link::Identity,
            probability: 0.3,
            contributions: vec![contribution("X1", 0.0, 0.0)],
        };
        let svg = force_plot_svg(&e);
        assert!(svg.contains("f(x) = 0.300"));
        assert!(!svg.contains("NaN"));
    }
}
