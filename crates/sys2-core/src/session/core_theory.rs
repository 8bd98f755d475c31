//! Embedded core theory pack
//!
//! Baseline operator properties and aliases most theories assume. Loaded at
//! session construction when `auto_load_core` is on; sessions that want a
//! completely bare substrate construct with it off.

/// Core declarations in Sys2DSL
pub const CORE_THEORY: &str = r#"
# Taxonomy and composition are transitive
@_ IS_A IS_A transitive_relation
@_ PART_OF IS_A transitive_relation

# Properties that flow down the taxonomy
@_ CAN IS_A inheritable_property
@_ HAS IS_A inheritable_property
@_ LIVES_IN IS_A inheritable_property

# Negation-paired operators
negationOf CANNOT CAN
negationOf LACKS HAS

# Common alias spellings
synonym isA IS_A
synonym is_a IS_A
synonym partOf PART_OF

# Temporal ordering conflicts with its own swapped form
contradictsSameArgs before
contradictsSameArgs after
inverseOf before after
"#;
