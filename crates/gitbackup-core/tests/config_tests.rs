mod common;

use common::{ini, write_file};
use gitbackup_core::config::load_config;
use gitbackup_core::{DEFAULT_EXCLUDES, ExclusionEvaluator, PathLayout};

#[test]
fn test_loaded_config_drives_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "src/a.txt", b"hello");

    let path = ini(
        dir.path(),
        "[Backup]\n\
         SourcePath = src\n\
         RepoPath = store\n\
         AuthorName = Backup Bot\n\
         AuthorEmail = backup@example.com\n\
         Exclude = *.log, build/\n\
         Exclude2 = !keep.log\n\
         Exclude1 = *.tmp\n\
         MaxFileSize = 1K\n",
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.exclusion_patterns(), ["*.log", "build/", "*.tmp", "!keep.log"]);
    assert_eq!(config.max_file_size(), 1024);

    let rules = ExclusionEvaluator::from_config(&config);
    assert!(rules.matches_patterns("debug.log"));
    assert!(!rules.matches_patterns("keep.log"));
    assert!(rules.matches_patterns("build/out.o"));
    assert!(!rules.matches_patterns("a.txt"));
}

#[test]
fn test_defaults_apply_without_patterns() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();

    let path = ini(
        dir.path(),
        "source = src\n\
         repository = store\n\
         author_name = Backup Bot\n\
         author-email = backup@example.com\n",
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.exclusion_patterns(), DEFAULT_EXCLUDES);
    assert!(config.use_flat_store());
    assert_eq!(config.path_layout(), PathLayout::Preserve);
    assert_eq!(config.branch(), "main");
}
