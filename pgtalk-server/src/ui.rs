//! Single-page front end served at `/`. Talks to `POST /ask`.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Talk to Your Postgres Database</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
  input[type=text] { width: 100%; padding: .6rem; font-size: 1rem; box-sizing: border-box; }
  pre { background: #f4f4f4; padding: .8rem; overflow-x: auto; }
  table { border-collapse: collapse; width: 100%; font-size: .9rem; }
  th, td { border: 1px solid #ddd; padding: .3rem .5rem; text-align: left; }
  th { background: #fafafa; }
  .error { color: #b00020; }
  .muted { color: #666; }
</style>
</head>
<body>
<h1>Talk to Your Postgres Database</h1>
<p>Ask questions about your data in natural language</p>
<form id="ask">
  <label for="question">Ask a question about your data:</label>
  <input type="text" id="question" name="question" autocomplete="off" autofocus>
</form>
<div id="status" class="muted"></div>
<div id="output"></div>
<script>
const form = document.getElementById('ask');
const statusEl = document.getElementById('status');
const output = document.getElementById('output');

function el(tag, text, cls) {
  const node = document.createElement(tag);
  if (text !== undefined) node.textContent = text;
  if (cls) node.className = cls;
  return node;
}

function cell(value) {
  if (value === null) return '';
  return typeof value === 'object' ? JSON.stringify(value) : String(value);
}

function renderTable(columns, rows) {
  const table = el('table');
  const head = table.createTHead().insertRow();
  columns.forEach(c => head.appendChild(el('th', c)));
  const body = table.createTBody();
  rows.forEach(r => {
    const tr = body.insertRow();
    r.forEach(v => tr.appendChild(el('td', cell(v))));
  });
  return table;
}

form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const question = document.getElementById('question').value;
  if (!question.trim()) return;
  output.replaceChildren();
  statusEl.textContent = 'Generating SQL...';
  try {
    const resp = await fetch('/ask', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ question }),
    });
    const data = await resp.json();
    statusEl.textContent = '';
    if (data.sql) {
      output.appendChild(el('h3', 'Generated SQL:'));
      output.appendChild(el('pre', data.sql));
    }
    if (!resp.ok) {
      output.appendChild(el('p', data.error, 'error'));
      return;
    }
    output.appendChild(el('h3', 'Query Results:'));
    output.appendChild(renderTable(data.columns, data.rows));
    const note = data.row_count + ' row(s)' + (data.truncated ? ', truncated' : '') + ' in ' + data.took_ms + ' ms';
    output.appendChild(el('p', note, 'muted'));
    output.appendChild(el('h3', 'Explanation:'));
    if (data.explanation) {
      output.appendChild(el('p', data.explanation));
    } else {
      output.appendChild(el('p', data.explanation_error || 'No explanation available.', 'error'));
    }
  } catch (err) {
    statusEl.textContent = '';
    output.appendChild(el('p', String(err), 'error'));
  }
});
</script>
</body>
</html>
"#;
