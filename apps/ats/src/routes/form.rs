use axum::response::Html;

const UPLOAD_FORM: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Resume ATS</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; }
    label { display: block; margin-top: 1.25rem; font-weight: 600; }
    input, textarea, select { width: 100%; margin-top: .4rem; }
    textarea { min-height: 8rem; }
    button { margin-top: 1.5rem; padding: .6rem 1.4rem; }
    small { color: #666; }
  </style>
</head>
<body>
  <h1>Resume ATS</h1>
  <p>Upload resumes to score them against the rubric. The results download as <code>ATS_details.csv</code> or <code>ATS_details.xlsx</code>.</p>
  <form action="/api/v1/evaluations" method="post" enctype="multipart/form-data">
    <label for="files">Resumes</label>
    <input id="files" name="files" type="file" multiple required accept=".pdf,.doc,.docx">
    <small>PDF, DOC or DOCX</small>

    <label for="api_key">Model API key</label>
    <input id="api_key" name="api_key" type="password" autocomplete="off">
    <small>Leave blank to use the key configured on the server.</small>

    <label for="job_description">Job description (optional)</label>
    <textarea id="job_description" name="job_description"></textarea>

    <label for="job_description_file">...or upload it (optional)</label>
    <input id="job_description_file" name="job_description_file" type="file" accept=".pdf,.doc,.docx">

    <label for="format">Report format</label>
    <select id="format" name="format">
      <option value="">Server default</option>
      <option value="csv">CSV</option>
      <option value="xlsx">Excel (XLSX)</option>
    </select>

    <button type="submit">Evaluate</button>
  </form>
</body>
</html>
"#;

/// GET /
pub async fn form_handler() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}
