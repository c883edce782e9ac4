//! End-to-end configuration enumeration through the SMT backend.
//!
//! These tests drive a real `z3` process; they skip with a notice when no
//! binary is on `PATH`.

use featurekit::model::{ExprKind, RelationshipKind, Req};
use featurekit::solver::ConfigurationFactory;
use featurekit::{
    Configuration, ConfigurationValue, ConstraintParser, FeatureModel, FeatureModelBuilder,
    NumericValues, StepFunction,
};

fn z3_available() -> bool {
    std::process::Command::new("z3")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

macro_rules! require_z3 {
    () => {
        if !z3_available() {
            eprintln!("skipping: no z3 binary on PATH");
            return;
        }
    };
}

fn selected(configuration: &Configuration, name: &str) -> bool {
    configuration.value(name) == Some(&ConfigurationValue::Bool(true))
}

/// Root `r` with children declared as `(name, optional)`.
fn flat_model(children: &[(&str, bool)]) -> FeatureModel {
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    for (name, optional) in children {
        builder.make_binary_feature(*name, *optional);
    }
    builder.build_feature_model().unwrap()
}

#[test]
fn single_mandatory_child_has_one_configuration() {
    require_z3!();
    let model = flat_model(&[("a", false)]);
    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    assert_eq!(configurations.len(), 1);
    let only = &configurations[0];
    assert!(selected(only, "r"));
    assert!(selected(only, "a"));
}

#[test]
fn optional_child_has_two_configurations() {
    require_z3!();
    let model = flat_model(&[("a", true)]);
    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    assert_eq!(configurations.len(), 2);
    assert!(configurations.iter().all(|c| selected(c, "r")));
    assert_eq!(
        configurations.iter().filter(|c| selected(c, "a")).count(),
        1
    );
}

#[test]
fn alternative_group_of_three_selects_exactly_one() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("A", false);
    for name in ["A1", "A2", "A3"] {
        builder.make_binary_feature(name, false);
        builder.add_edge("A", name);
    }
    builder.emplace_relationship(RelationshipKind::Alternative, "A");
    let model = builder.build_feature_model().unwrap();

    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    assert_eq!(configurations.len(), 3);
    for configuration in &configurations {
        let chosen = ["A1", "A2", "A3"]
            .iter()
            .filter(|name| selected(configuration, name))
            .count();
        assert_eq!(chosen, 1);
    }
}

#[test]
fn alternative_pair_is_exclusive_or() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("A", false);
    builder.make_binary_feature("L", false);
    builder.make_binary_feature("R", false);
    builder.add_edge("A", "L");
    builder.add_edge("A", "R");
    builder.emplace_relationship(RelationshipKind::Alternative, "A");
    let model = builder.build_feature_model().unwrap();

    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    // never both, never neither
    assert_eq!(configurations.len(), 2);
    for configuration in &configurations {
        assert!(selected(configuration, "L") != selected(configuration, "R"));
    }
}

#[test]
fn or_group_of_three_has_seven_configurations() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("C", false);
    for name in ["C1", "C2", "C3"] {
        builder.make_binary_feature(name, true);
        builder.add_edge("C", name);
    }
    builder.emplace_relationship(RelationshipKind::Or, "C");
    let model = builder.build_feature_model().unwrap();

    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 7);
    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    for configuration in &configurations {
        assert!(
            ["C1", "C2", "C3"]
                .iter()
                .any(|name| selected(configuration, name))
        );
    }
}

#[test]
fn cross_tree_implication_leaves_three_configurations() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("a", true);
    builder.make_binary_feature("b", true);
    builder.add_constraint(ConstraintParser::new("a -> !b").build_constraint().unwrap());
    let model = builder.build_feature_model().unwrap();

    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    assert_eq!(configurations.len(), 3);
    assert!(
        !configurations
            .iter()
            .any(|c| selected(c, "a") && selected(c, "b"))
    );
}

#[test]
fn numeric_list_domain_multiplies_the_space() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_numeric_feature("Num1", false, NumericValues::list(vec![0, 1]));
    builder.make_binary_feature("Foo", true);
    let model = builder.build_feature_model().unwrap();

    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    assert_eq!(configurations.len(), 4);
    let mut values: Vec<i64> = configurations
        .iter()
        .filter_map(|c| c.value("Num1").and_then(ConfigurationValue::as_integer))
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![0, 0, 1, 1]);
}

#[test]
fn stepped_range_enumerates_doubling_domain() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_numeric_feature(
        "n",
        false,
        NumericValues::stepped_range(
            1,
            8,
            StepFunction::new(featurekit::constraint::StepOperation::Multiplication, 2.0),
        ),
    );
    let model = builder.build_feature_model().unwrap();

    // domain {1, 2, 4, 8}
    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 4);
}

#[test]
fn range_without_step_counts_in_unit_increments() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_numeric_feature("n", false, NumericValues::range(0, 4));
    let model = builder.build_feature_model().unwrap();

    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 5);
}

#[test]
fn arithmetic_constraint_prunes_numeric_space() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_numeric_feature("n", false, NumericValues::list(vec![1, 2, 3, 4]));
    builder.add_constraint(ConstraintParser::new("n * 2 <= 4").build_constraint().unwrap());
    let model = builder.build_feature_model().unwrap();

    let configurations = ConfigurationFactory::all_configs(&model).unwrap();
    let mut values: Vec<i64> = configurations
        .iter()
        .filter_map(|c| c.value("n").and_then(ConfigurationValue::as_integer))
        .collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn mixed_constraint_req_all_only_fires_when_all_selected() {
    require_z3!();
    let constraint = || {
        ConstraintParser::new("a + b = 2")
            .build_constraint()
            .unwrap()
    };

    // Req::All - the expression may be escaped by deselecting a referenced
    // feature: all four configurations survive.
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("a", true);
    builder.make_binary_feature("b", true);
    builder.add_mixed_constraint(constraint(), ExprKind::Pos, Req::All);
    let model = builder.build_feature_model().unwrap();
    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 4);

    // Req::None - the expression always fires: both features must be
    // selected.
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("a", true);
    builder.make_binary_feature("b", true);
    builder.add_mixed_constraint(constraint(), ExprKind::Pos, Req::None);
    let model = builder.build_feature_model().unwrap();
    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 1);

    // negated expression with Req::None excludes exactly that assignment
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("a", true);
    builder.make_binary_feature("b", true);
    builder.add_mixed_constraint(constraint(), ExprKind::Neg, Req::None);
    let model = builder.build_feature_model().unwrap();
    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 3);
}

#[test]
fn iterator_streams_the_same_set_as_all_configs() {
    require_z3!();
    let model = flat_model(&[("a", true), ("b", true)]);
    let mut streamed = Vec::new();
    for result in ConfigurationFactory::config_iterator(&model).unwrap() {
        streamed.push(result.unwrap());
    }
    assert_eq!(streamed.len(), 4);

    let mut all = ConfigurationFactory::all_configs(&model).unwrap();
    let sort_key = |c: &Configuration| c.to_json();
    streamed.sort_by_key(sort_key);
    all.sort_by_key(sort_key);
    assert_eq!(streamed, all);
}

#[test]
fn n_configs_truncates() {
    require_z3!();
    let model = flat_model(&[("a", true), ("b", true)]);
    assert_eq!(ConfigurationFactory::n_configs(&model, 3).unwrap().len(), 3);
    assert_eq!(ConfigurationFactory::n_configs(&model, 0).unwrap().len(), 0);
    assert_eq!(
        ConfigurationFactory::n_configs(&model, 99).unwrap().len(),
        4
    );
}

#[test]
fn unsatisfiable_model_is_reported_invalid() {
    require_z3!();
    let mut builder = FeatureModelBuilder::new();
    builder.make_root("r");
    builder.make_binary_feature("a", false);
    builder.add_constraint(ConstraintParser::new("!a").build_constraint().unwrap());
    let model = builder.build_feature_model().unwrap();

    assert!(!ConfigurationFactory::is_valid(&model).unwrap());
    assert_eq!(ConfigurationFactory::count(&model).unwrap(), 0);
    assert!(ConfigurationFactory::all_configs(&model).unwrap().is_empty());
}
