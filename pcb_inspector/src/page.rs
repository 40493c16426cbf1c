use crate::prediction::PredictionOutcome;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>PCB Fault Detection</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            margin: 0;
            background-color: #282a36;
            color: #e5e5e7;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
        }
        .main-container {
            text-align: center;
            background: #2c2c2e;
            padding: 40px;
            border-radius: 15px;
            box-shadow: 0 4px 30px rgba(0, 0, 0, 0.8);
            width: 90%;
            max-width: 600px;
        }
        h1 { color: #ffd700; }
        .file-upload {
            background-color: #3c3c3e;
            border: 2px dashed #545456;
            padding: 30px;
            border-radius: 10px;
            margin-bottom: 20px;
        }
        .submit-btn {
            padding: 10px 20px;
            font-size: 16px;
            border: none;
            border-radius: 25px;
            background: linear-gradient(90deg, #ff8c00, #ff4500);
            color: white;
            cursor: pointer;
        }
        .result-section { margin-top: 30px; }
        .result-section img { max-width: 100%; border-radius: 10px; }
        .detections { list-style: none; padding: 0; }
    </style>
</head>
<body>
    <div class="main-container">
        <h1>PCB Fault Detection</h1>
        <form action="/predict" method="post" enctype="multipart/form-data">
            <div class="file-upload">
                <label for="fileInput">Choose an image to inspect</label>
                <input id="fileInput" type="file" name="image" accept="image/*" required>
            </div>
            <button type="submit" class="submit-btn">Run Detection</button>
        </form>
"#;

const PAGE_TAIL: &str = r#"    </div>
</body>
</html>
"#;

pub fn render_index() -> String {
    format!("{}{}", PAGE_HEAD, PAGE_TAIL)
}

pub fn render_result(outcome: &PredictionOutcome) -> String {
    let mut section = String::new();
    section.push_str("        <div class=\"result-section\">\n");
    section.push_str("            <h2>Detection Results:</h2>\n");
    section.push_str(&format!(
        "            <p class=\"status\">{}</p>\n",
        escape_html(outcome.status.as_str())
    ));
    section.push_str(&format!(
        "            <img src=\"{}\" alt=\"Detected Objects\">\n",
        escape_html(&outcome.artifact.url)
    ));

    if !outcome.detections.is_empty() {
        section.push_str("            <ul class=\"detections\">\n");
        for detection in &outcome.detections {
            section.push_str(&format!(
                "                <li>{}: {:.2}</li>\n",
                escape_html(&detection.class_label),
                detection.confidence
            ));
        }
        section.push_str("            </ul>\n");
    }
    section.push_str("        </div>\n");

    format!("{}{}{}", PAGE_HEAD, section, PAGE_TAIL)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
