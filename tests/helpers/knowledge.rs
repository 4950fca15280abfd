use std::path::Path;

/// Seed one page directory in a knowledge store root with summary,
/// index, and a placeholder rendered image.
#[allow(dead_code)]
pub async fn seed_page(root: &Path, page: &str, discipline: &str, summary: &str) {
    let page_dir = root.join(page);
    tokio::fs::create_dir_all(&page_dir)
        .await
        .expect("failed to create page dir");

    tokio::fs::write(
        page_dir.join("pass1.json"),
        serde_json::json!({
            "discipline": discipline,
            "page_type": "schedule",
            "summary": summary,
        })
        .to_string(),
    )
    .await
    .expect("failed to write summary");

    tokio::fs::write(
        page_dir.join("pass2.json"),
        serde_json::json!({ "regions": [] }).to_string(),
    )
    .await
    .expect("failed to write index");

    tokio::fs::write(page_dir.join("page.png"), b"not-a-real-png")
        .await
        .expect("failed to write image");
}
