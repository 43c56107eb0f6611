use crate::director::{CreateDisposition, FileAccessMode};
use crate::instruction::{
    CreateDispositionPreference, DirectoryEnumerationInstruction, DirectoryFilterScope,
    EnumerationPathSource, FileOperationInstruction, NameAssociation, PreOperations, TryFiles,
};
use crate::rule::RedirectMode;

use super::{director_with_rules, filesystem_with_directories, TestRule};

#[test]
fn select_rule_for_exact_origin_path() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let rule = director.select_rule_for_path("C:\\Game\\Saves").expect("rule for origin");
    assert_eq!(rule.name(), "Saves");
    assert!(director.select_rule_for_path("C:\\Game").is_none());
    assert!(director.select_rule_for_path("C:\\Elsewhere\\File.txt").is_none());
}

#[test]
fn select_rule_for_descendant_prefers_deepest_origin() {
    let filesystem = filesystem_with_directories(&[
        "C:\\Game",
        "C:\\Game\\Saves",
        "D:\\Wide",
        "D:\\Deep",
    ]);
    let director = director_with_rules(
        filesystem,
        &[
            TestRule::simple("Wide", "C:\\Game", "D:\\Wide"),
            TestRule::simple("Deep", "C:\\Game\\Saves", "D:\\Deep"),
        ],
    );

    let rule = director
        .select_rule_for_path("C:\\Game\\Saves\\slot1\\player.sav")
        .expect("deepest rule");
    assert_eq!(rule.name(), "Deep");

    let rule = director.select_rule_for_path("C:\\Game\\Config\\video.ini").expect("outer rule");
    assert_eq!(rule.name(), "Wide");
}

#[test]
fn select_rule_matches_immediate_child_against_patterns() {
    let filesystem = filesystem_with_directories(&["C:\\Game", "D:\\A", "D:\\B"]);
    let director = director_with_rules(
        filesystem,
        &[
            TestRule::simple("SavesOnly", "C:\\Game", "D:\\A").with_patterns(&["Saves"]),
            TestRule::simple("ShotsOnly", "C:\\Game", "D:\\B").with_patterns(&["Shots"]),
        ],
    );

    assert_eq!(
        director.select_rule_for_path("C:\\Game\\Saves\\player.sav").unwrap().name(),
        "SavesOnly"
    );
    assert_eq!(
        director.select_rule_for_path("C:\\Game\\Shots\\shot1.png").unwrap().name(),
        "ShotsOnly"
    );
    assert!(director.select_rule_for_path("C:\\Game\\Other\\file.txt").is_none());
}

#[test]
fn patterned_rules_are_consulted_before_catch_alls() {
    let filesystem = filesystem_with_directories(&["C:\\Game", "D:\\A", "D:\\B"]);
    let director = director_with_rules(
        filesystem,
        &[
            TestRule::simple("CatchAll", "C:\\Game", "D:\\A"),
            TestRule::simple("Specific", "C:\\Game", "D:\\B").with_patterns(&["Saves"]),
        ],
    );

    assert_eq!(
        director.select_rule_for_path("C:\\Game\\Saves\\x").unwrap().name(),
        "Specific"
    );
    assert_eq!(
        director.select_rule_for_path("C:\\Game\\Other\\x").unwrap().name(),
        "CatchAll"
    );
}

#[test]
fn file_operation_under_a_target_is_unredirected_only() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "D:\\Mods\\Saves\\player.sav",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.try_files(), TryFiles::UnredirectedOnly);
    assert!(!instruction.has_redirected_file_name());
}

#[test]
fn file_operation_outside_any_rule_is_a_no_op() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "C:\\Unrelated\\file.txt",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction, FileOperationInstruction::no_redirection_or_interception());
}

#[test]
fn file_operation_on_origin_ancestor_is_intercepted_without_redirection() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "C:\\Game",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.try_files(), TryFiles::UnredirectedOnly);
    assert!(!instruction.has_redirected_file_name());
    assert_eq!(instruction.name_association(), NameAssociation::WhicheverSucceeded);
}

#[test]
fn simple_mode_redirects_exclusively() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.redirected_file_name(), Some("D:\\Mods\\Saves\\player.sav"));
    assert_eq!(instruction.try_files(), TryFiles::RedirectedOnly);
    assert_eq!(instruction.name_association(), NameAssociation::Unredirected);
    assert_eq!(
        instruction.create_disposition_preference(),
        CreateDispositionPreference::NoPreference
    );
    assert_eq!(instruction.pre_operations(), PreOperations::empty());
}

#[test]
fn overlay_mode_redirects_with_fallback() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::overlay("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.try_files(), TryFiles::RedirectedFirst);
    assert_eq!(
        instruction.create_disposition_preference(),
        CreateDispositionPreference::NoPreference
    );

    // Open-or-create through an overlay prefers opening whatever exists.
    let instruction = director.instruction_for_file_operation(
        "C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_write(),
        CreateDisposition::create_new_or_open_existing_file(),
    );
    assert_eq!(
        instruction.create_disposition_preference(),
        CreateDispositionPreference::PreferOpenExistingFile
    );
}

#[test]
fn namespace_prefix_is_carried_into_the_redirected_path() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director.instruction_for_file_operation(
        "\\??\\C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.redirected_file_name(), Some("\\??\\D:\\Mods\\Saves\\player.sav"));
}

#[test]
fn missing_target_parent_attaches_a_pre_operation() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Deep", "C:\\Game\\Saves", "D:\\Mods\\Deep\\Saves")],
    );

    // Opening for read only does not need the target hierarchy.
    let instruction = director.instruction_for_file_operation(
        "C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_only(),
        CreateDisposition::open_existing_file(),
    );
    assert_eq!(instruction.pre_operations(), PreOperations::empty());

    // Creating a file does.
    let instruction = director.instruction_for_file_operation(
        "C:\\Game\\Saves\\player.sav",
        FileAccessMode::read_write(),
        CreateDisposition::create_new_file(),
    );
    assert_eq!(instruction.pre_operations(), PreOperations::ENSURE_PATH_HIERARCHY_EXISTS);
    assert_eq!(instruction.pre_operation_operand(), Some("D:\\Mods\\Deep\\Saves"));
}

#[test]
fn enumeration_of_a_redirected_origin_merges_both_sides() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")
            .with_patterns(&["*.sav"])],
    );

    let instruction = director
        .instruction_for_directory_enumeration("C:\\Game\\Saves", "D:\\Mods\\Saves");
    let directories = instruction.directories_to_enumerate();
    assert_eq!(directories.len(), 2);
    assert_eq!(directories[0].path_source, EnumerationPathSource::RealOpenedPath);
    assert!(matches!(directories[0].scope, DirectoryFilterScope::IncludeOnlyMatching(_)));
    assert_eq!(directories[1].path_source, EnumerationPathSource::AssociatedPath);
    assert!(matches!(
        directories[1].scope,
        DirectoryFilterScope::IncludeAllExceptMatching(_)
    ));
    assert!(!instruction.has_directory_names_to_insert());
}

#[test]
fn enumeration_of_a_virtual_origin_skips_the_associated_side() {
    let filesystem = filesystem_with_directories(&["C:\\Game", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director
        .instruction_for_directory_enumeration("C:\\Game\\Saves", "D:\\Mods\\Saves");
    let directories = instruction.directories_to_enumerate();
    assert_eq!(directories.len(), 1);
    assert_eq!(directories[0].path_source, EnumerationPathSource::RealOpenedPath);
}

#[test]
fn enumeration_of_an_origin_parent_inserts_virtual_names() {
    let filesystem = filesystem_with_directories(&["C:\\Game", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let mut instruction =
        director.instruction_for_directory_enumeration("C:\\Game", "C:\\Game");
    assert!(instruction.has_directory_names_to_insert());

    // The parent's own real contents stay visible alongside the insertion.
    let directories = instruction.directories_to_enumerate();
    assert_eq!(directories.len(), 1);
    assert_eq!(directories[0].path_source, EnumerationPathSource::RealOpenedPath);
    assert!(matches!(directories[0].scope, DirectoryFilterScope::IncludeAll));

    let insertions = instruction.take_directory_names_to_insert();
    assert_eq!(insertions.len(), 1);
    assert_eq!(insertions[0].file_name_to_insert, "Saves");
    assert_eq!(insertions[0].information_source_directory, "D:\\Mods");
    assert_eq!(insertions[0].information_source_name, "Saves");
}

#[test]
fn enumeration_does_not_insert_names_for_physical_origins() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction =
        director.instruction_for_directory_enumeration("C:\\Game", "C:\\Game");
    assert_eq!(instruction, DirectoryEnumerationInstruction::pass_through_unmodified_query());
}

#[test]
fn enumeration_of_an_unrelated_directory_passes_through() {
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves", "D:\\Mods\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::simple("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction =
        director.instruction_for_directory_enumeration("C:\\Other", "C:\\Other");
    assert!(instruction.is_pass_through());
}

#[test]
fn enumeration_after_overlay_fallback_passes_through() {
    // Overlay open fell back to the origin side: associated and real agree,
    // and no virtual children exist, so the system's own listing is right.
    let filesystem = filesystem_with_directories(&["C:\\Game\\Saves"]);
    let director = director_with_rules(
        filesystem,
        &[TestRule::overlay("Saves", "C:\\Game\\Saves", "D:\\Mods\\Saves")],
    );

    let instruction = director
        .instruction_for_directory_enumeration("C:\\Game\\Saves", "C:\\Game\\Saves");
    assert!(instruction.is_pass_through());
}

#[test]
fn redirect_mode_choice_respects_rule_mode() {
    let filesystem = filesystem_with_directories(&["C:\\O", "D:\\S", "D:\\V"]);
    let director = director_with_rules(
        filesystem,
        &[
            TestRule { name: "S", origin: "C:\\O\\Simple", target: "D:\\S", patterns: &[], mode: RedirectMode::Simple },
            TestRule { name: "V", origin: "C:\\O\\Overlay", target: "D:\\V", patterns: &[], mode: RedirectMode::Overlay },
        ],
    );

    assert_eq!(
        director
            .instruction_for_file_operation(
                "C:\\O\\Simple\\f",
                FileAccessMode::read_only(),
                CreateDisposition::open_existing_file(),
            )
            .try_files(),
        TryFiles::RedirectedOnly
    );
    assert_eq!(
        director
            .instruction_for_file_operation(
                "C:\\O\\Overlay\\f",
                FileAccessMode::read_only(),
                CreateDisposition::open_existing_file(),
            )
            .try_files(),
        TryFiles::RedirectedFirst
    );
}
