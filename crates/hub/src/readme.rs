/// Dataset card uploaded next to the published index
pub fn dataset_readme(repo_id: &str, path_in_repo: &str, passages: Option<usize>) -> String {
    let passages = passages
        .map(|n| format!("- Passages: {} embedded abstract chunks\n", n))
        .unwrap_or_default();

    format!(
        "# COVID-19 CORD-19 Vectorstore

This dataset contains a vector index with embeddings for COVID-19 research papers from the CORD-19 dataset.

## Usage

This index is downloaded by the cordchat RAG chatbot for COVID-19 research Q&A.
Set `HF_DATASET_REPO={repo_id}` and the server fetches it on first start.

## Contents

- `{path}/`: vector index files (`index.json`) including embeddings and paper metadata
- Papers: ~2000 recent COVID-19 research papers
{passages}- Embeddings: OpenAI embeddings

## Citation

If you use this dataset, please cite the original CORD-19 dataset.
",
        repo_id = repo_id,
        path = path_in_repo.trim_matches('/'),
        passages = passages,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_mentions_repo_and_folder() {
        let readme = dataset_readme("someone/cord19_index", "/vectorstore/", Some(2412));
        assert!(readme.starts_with("# COVID-19 CORD-19 Vectorstore"));
        assert!(readme.contains("HF_DATASET_REPO=someone/cord19_index"));
        assert!(readme.contains("- `vectorstore/`"));
        assert!(readme.contains("- Passages: 2412 embedded abstract chunks\n- Embeddings"));
    }

    #[test]
    fn test_readme_without_passage_count() {
        let readme = dataset_readme("a/b", "vectorstore", None);
        assert!(!readme.contains("Passages:"));
        assert!(readme.contains("research papers\n- Embeddings"));
    }
}
