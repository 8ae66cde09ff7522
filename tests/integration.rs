use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn fiche_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("fiche");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "Plate tectonics moves continents. Magma rises at ridges.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "Photosynthesis converts light into sugar. Chlorophyll absorbs red light.",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "La guerre froide oppose deux blocs. Le mur de Berlin tombe en 1989.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/fiche.sqlite"

[stopwords]
languages = ["fr", "en"]

[reports]
dir = "{root}/data/reports"

[log]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("fiche.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_fiche(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = fiche_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run fiche binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_ok(config_path: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_fiche(config_path, args);
    assert!(
        success,
        "fiche {:?} failed: stdout={}, stderr={}",
        args, stdout, stderr
    );
    stdout
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

fn file_arg(config_path: &Path, name: &str) -> String {
    files_dir(config_path).join(name).to_string_lossy().to_string()
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let stdout = run_ok(&config_path, &["init"]);
    assert!(stdout.contains("initialized"));
    run_ok(&config_path, &["init"]);
}

#[test]
fn test_add_and_list() {
    let (_tmp, config_path) = setup_test_env();
    run_ok(&config_path, &["init"]);

    let alpha = file_arg(&config_path, "alpha.md");
    let beta = file_arg(&config_path, "beta.md");
    let stdout = run_ok(&config_path, &["add", &alpha, &beta]);
    assert!(stdout.contains("added alpha"));
    assert!(stdout.contains("added beta"));

    let stdout = run_ok(&config_path, &["add", &alpha]);
    assert!(stdout.contains("unchanged alpha"));

    let stdout = run_ok(&config_path, &["list"]);
    assert!(stdout.contains("alpha"));
    assert!(stdout.contains("beta"));
    assert!(stdout.contains("2 document(s)"));
}

#[test]
fn test_add_rejects_unsupported_file() {
    let (_tmp, config_path) = setup_test_env();
    let odt = files_dir(&config_path).join("notes.odt");
    fs::write(&odt, "some text").unwrap();

    let (_, stderr, success) = run_fiche(&config_path, &["add", odt.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));
}

#[test]
fn test_add_text_with_title() {
    let (_tmp, config_path) = setup_test_env();
    let stdout = run_ok(
        &config_path,
        &[
            "add-text",
            "Rivers carve valleys over time.",
            "--id",
            "rivers",
            "--title",
            "Fluvial erosion",
        ],
    );
    assert!(stdout.contains("added rivers"));

    let stdout = run_ok(&config_path, &["list"]);
    assert!(stdout.contains("Fluvial erosion"));
}

#[test]
fn test_summary_regenerates_after_change() {
    let (_tmp, config_path) = setup_test_env();
    let alpha = file_arg(&config_path, "alpha.md");
    run_ok(&config_path, &["add", &alpha]);

    let stdout = run_ok(&config_path, &["summary", "alpha"]);
    assert!(stdout.starts_with("# alpha"));
    assert!(stdout.contains("Plate tectonics moves continents."));

    let stdout = run_ok(&config_path, &["status"]);
    assert!(stdout.contains("summary:alpha"));
    assert!(stdout.contains("fresh"));

    fs::write(&alpha, "Erosion wears mountains down. Rivers carry sediment.").unwrap();
    let stdout = run_ok(&config_path, &["add", &alpha]);
    assert!(stdout.contains("updated alpha"));

    let stdout = run_ok(&config_path, &["status"]);
    assert!(stdout.contains("dirty"));

    let stdout = run_ok(&config_path, &["summary", "alpha"]);
    assert!(stdout.contains("Erosion wears mountains down."));

    run_ok(&config_path, &["report"]);
    let reports = config_path.parent().unwrap().parent().unwrap().join("data/reports");
    let csv = fs::read_to_string(reports.join("summaries.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "document_id,title,version,state,updated_at");
    assert!(lines[1].starts_with("alpha,alpha,2,fresh,"), "{}", lines[1]);
}

#[test]
fn test_summary_out_writes_markdown() {
    let (tmp, config_path) = setup_test_env();
    let beta = file_arg(&config_path, "beta.md");
    run_ok(&config_path, &["add", &beta]);

    let out = tmp.path().join("out/beta.md");
    let stdout = run_ok(
        &config_path,
        &["summary", "beta", "--out", out.to_str().unwrap()],
    );
    assert!(stdout.contains("Wrote summary v1"));
    let md = fs::read_to_string(&out).unwrap();
    assert!(md.contains("Photosynthesis"));
}

#[test]
fn test_summary_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_fiche(&config_path, &["summary", "ghost"]);
    assert!(!success);
    assert!(stderr.contains("document not found: ghost"));
}

#[test]
fn test_card_lifecycle() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);
    run_ok(&config_path, &["sync", dir.to_str().unwrap()]);

    let stdout = run_ok(&config_path, &["card", "create", "everything", "--all"]);
    assert!(stdout.contains("card everything (3 document(s))"));

    let stdout = run_ok(&config_path, &["card", "show", "everything"]);
    assert!(stdout.starts_with("# everything"));
    assert!(stdout.contains("## 1. Key concepts"));
    assert!(stdout.contains("## 2. Definitions"));
    assert!(stdout.contains("## 3. Examples"));
    assert!(stdout.contains("## 4. Open questions"));

    run_ok(&config_path, &["report"]);
    let reports = config_path.parent().unwrap().parent().unwrap().join("data/reports");
    let csv = fs::read_to_string(reports.join("cards.csv")).unwrap();
    assert!(csv.contains("everything,alpha.md;beta.md;gamma.txt,1,fresh,"));

    run_ok(&config_path, &["card", "remove", "everything"]);
    let (_, _, success) = run_fiche(&config_path, &["card", "show", "everything"]);
    assert!(!success);
}

#[test]
fn test_card_create_requires_one_mode() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_fiche(&config_path, &["card", "create", "x"]);
    assert!(!success);
}

#[test]
fn test_sync_prunes_deleted_files() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);

    let stdout = run_ok(&config_path, &["sync", dir.to_str().unwrap()]);
    assert!(stdout.contains("added: 3"));
    assert!(stdout.contains("ok"));

    let stdout = run_ok(&config_path, &["sync", dir.to_str().unwrap()]);
    assert!(stdout.contains("unchanged: 3"));

    fs::remove_file(dir.join("gamma.txt")).unwrap();
    let stdout = run_ok(&config_path, &["sync", dir.to_str().unwrap()]);
    assert!(stdout.contains("unchanged: 2"));
    assert!(stdout.contains("removed: 1"));

    let stdout = run_ok(&config_path, &["list"]);
    assert!(!stdout.contains("gamma.txt"));
    assert!(stdout.contains("2 document(s)"));
}

#[test]
fn test_sync_skips_blank_files() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);
    fs::write(dir.join("empty.md"), "   \n").unwrap();

    let stdout = run_ok(&config_path, &["sync", dir.to_str().unwrap()]);
    assert!(stdout.contains("added: 3"));
    assert!(stdout.contains("skipped: 1"));
}

#[test]
fn test_remove_document() {
    let (_tmp, config_path) = setup_test_env();
    let alpha = file_arg(&config_path, "alpha.md");
    run_ok(&config_path, &["add", &alpha]);
    run_ok(&config_path, &["summary", "alpha"]);

    let stdout = run_ok(&config_path, &["remove", "alpha"]);
    assert!(stdout.contains("removed alpha"));

    let stdout = run_ok(&config_path, &["status"]);
    assert!(stdout.contains("No summaries or cards generated yet."));

    let (_, _, success) = run_fiche(&config_path, &["remove", "alpha"]);
    assert!(!success);
}

#[test]
fn test_terms_and_stats() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);
    run_ok(&config_path, &["sync", dir.to_str().unwrap()]);

    let stdout = run_ok(&config_path, &["terms", "alpha.md", "-k", "3"]);
    assert!(stdout.contains("Top terms for alpha.md"));
    assert!(stdout.contains(" 1. "));

    let stdout = run_ok(&config_path, &["stats"]);
    assert!(stdout.contains("Documents:      3"));
}

#[test]
fn test_sync_keeps_same_relative_path_from_two_roots_apart() {
    let (tmp, config_path) = setup_test_env();
    let histoire = tmp.path().join("histoire");
    let geo = tmp.path().join("geo");
    fs::create_dir_all(&histoire).unwrap();
    fs::create_dir_all(&geo).unwrap();
    fs::write(histoire.join("notes.md"), "Le mur de Berlin tombe en 1989.").unwrap();
    fs::write(geo.join("notes.md"), "Les plaques tectoniques bougent lentement.").unwrap();

    let stdout = run_ok(&config_path, &["sync", histoire.to_str().unwrap()]);
    assert!(stdout.contains("added: 1"));

    let (stdout, stderr, success) = run_fiche(&config_path, &["sync", geo.to_str().unwrap()]);
    assert!(success, "stderr={}", stderr);
    assert!(stdout.contains("added: 0"));
    assert!(stdout.contains("updated: 0"));
    assert!(stdout.contains("skipped: 1"));
    assert!(stderr.contains("id already taken"));

    let stdout = run_ok(&config_path, &["sync", histoire.to_str().unwrap()]);
    assert!(stdout.contains("unchanged: 1"));

    let stdout = run_ok(&config_path, &["summary", "notes.md"]);
    assert!(stdout.contains("Berlin"));
}

#[test]
fn test_remove_document_without_summary() {
    let (_tmp, config_path) = setup_test_env();
    let beta = file_arg(&config_path, "beta.md");
    run_ok(&config_path, &["add", &beta]);

    let stdout = run_ok(&config_path, &["remove", "beta"]);
    assert!(stdout.contains("removed beta"));

    let stdout = run_ok(&config_path, &["list"]);
    assert!(stdout.contains("No documents"));
}

#[test]
fn test_select_spans_across_documents() {
    let (_tmp, config_path) = setup_test_env();
    let dir = files_dir(&config_path);
    run_ok(&config_path, &["sync", dir.to_str().unwrap()]);

    let stdout = run_ok(&config_path, &["select", "alpha.md", "beta.md"]);
    assert!(stdout.contains("Plate tectonics moves continents."));
    assert!(stdout.contains("Photosynthesis converts light into sugar."));
    assert!(stdout.contains("4 span(s)"));

    let (_, stderr, success) = run_fiche(&config_path, &["select", "alpha.md", "ghost"]);
    assert!(!success);
    assert!(stderr.contains("document not found: ghost"));
}
