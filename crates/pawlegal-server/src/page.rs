/// Single-page UI: case form in a sidebar, results in the main column,
/// progress streamed from `/api/logs`.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Animal Welfare Legal Assistant</title>
<style>
  body { margin: 0; font-family: system-ui, sans-serif; color: #1f2328; display: flex; min-height: 100vh; }
  aside { width: 22rem; padding: 1.5rem; background: #f0f2f6; box-sizing: border-box; }
  main { flex: 1; padding: 2rem 3rem; max-width: 60rem; }
  textarea { width: 100%; min-height: 12rem; box-sizing: border-box; font: inherit; padding: .5rem; }
  label { display: block; margin: 1rem 0 .4rem; font-weight: 600; }
  button { margin-top: 1rem; padding: .6rem 1rem; font: inherit; cursor: pointer; }
  .notice { padding: .75rem 1rem; border-radius: .4rem; margin: 1rem 0; }
  .info { background: #e8f0fe; } .error { background: #fde8e8; } .success { background: #e6f4ea; }
  .section { white-space: pre-wrap; line-height: 1.5; }
  #progress { font-size: .85rem; color: #57606a; max-height: 10rem; overflow-y: auto; }
  footer { margin-top: 3rem; border-top: 1px solid #d0d7de; padding-top: 1rem; font-size: .9rem; color: #57606a; }
</style>
</head>
<body>
<aside>
  <h2>Case Information</h2>
  <form id="case-form">
    <label for="purpose">Describe the purpose of your legal action:</label>
    <textarea id="purpose" name="purpose" placeholder="Provide a brief description of the action you want to take..."></textarea>
    <label for="case_file">Upload Case Text Files (optional):</label>
    <input id="case_file" name="case_file" type="file" accept=".txt,text/plain" multiple>
    <button type="submit">Generate Recommendations</button>
  </form>
</aside>
<main>
  <h1>Animal Welfare Legal Assistant</h1>
  <div id="status"></div>
  <div id="progress"></div>
  <div id="results" hidden>
    <h2>Strategy</h2><div id="strategy" class="section"></div>
    <h2>Draft Complaint</h2><div id="complaint" class="section"></div>
    <h2>TODOs for you</h2><div id="todo" class="section"></div>
    <h2>Resources consulted</h2><ul id="urls"></ul>
  </div>
  <footer>
    <p>This app assists in researching and structuring legal cases related to animal welfare, especially around formulating a complaint.</p>
    <p>Obviously don't file the output of this without consulting a lawyer! This is just supposed to get you started and hopefully make your case look attractive to people who may want to work pro bono.</p>
  </footer>
</main>
<script>
  const form = document.getElementById("case-form");
  const status = document.getElementById("status");
  const progress = document.getElementById("progress");
  const results = document.getElementById("results");

  function notice(kind, text) {
    status.innerHTML = "";
    const div = document.createElement("div");
    div.className = "notice " + kind;
    div.textContent = text;
    status.appendChild(div);
  }

  const logs = new EventSource("/api/logs");
  logs.onmessage = (ev) => {
    if (ev.data === "ping") return;
    try {
      const line = JSON.parse(ev.data);
      if (line.category !== "script" && line.category !== "sources") return;
      const p = document.createElement("div");
      p.textContent = line.message;
      progress.appendChild(p);
      progress.scrollTop = progress.scrollHeight;
    } catch (_) {}
  };

  form.addEventListener("submit", async (ev) => {
    ev.preventDefault();
    if (!document.getElementById("purpose").value.trim()) {
      notice("error", "Please provide a description of your case in the sidebar.");
      return;
    }
    results.hidden = true;
    progress.innerHTML = "";
    notice("info", "Processing your input... Generating legal recommendations...");
    form.querySelector("button").disabled = true;
    try {
      const resp = await fetch("/api/recommendations", { method: "POST", body: new FormData(form) });
      const body = await resp.json();
      if (!resp.ok) {
        notice("error", body.error || ("Request failed: " + resp.status));
        return;
      }
      notice("success", "Recommendations generated!");
      document.getElementById("strategy").textContent = body.strategy;
      document.getElementById("complaint").textContent = body.complaint;
      document.getElementById("todo").textContent = body.todo;
      const urls = document.getElementById("urls");
      urls.innerHTML = "";
      for (const u of body.urls) {
        const li = document.createElement("li");
        const a = document.createElement("a");
        a.href = u; a.textContent = u; a.target = "_blank"; a.rel = "noopener";
        li.appendChild(a);
        urls.appendChild(li);
      }
      results.hidden = false;
    } catch (err) {
      notice("error", "An error occurred: " + err);
    } finally {
      form.querySelector("button").disabled = false;
    }
  });
</script>
</body>
</html>
"##;
