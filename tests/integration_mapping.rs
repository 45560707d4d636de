use approx::assert_relative_eq;
use fem_fields::fields::ElementXi;
use fem_fields::integration::{upwind_step, ElementMapping, IntegrationError, IntegrationMapping};
use fem_fields::{ElementFieldTemplate, FieldCache, FieldId, FiniteElementField, QuadratureRule, Region, TensorBasis};
use smallvec::smallvec;
use std::sync::Arc;

const CHAIN: &str = r#"{
    "Nodes": [[0.0], [1.0], [2.0], [3.0]],
    "Elements": [
        { "shape": "line", "node_ids": [0, 1] },
        { "shape": "line", "node_ids": [1, 2] },
        { "shape": "line", "node_ids": [2, 3] }
    ]
}"#;

const GRID: &str = r#"{
    "Nodes": [
        [0.0, 0.0], [1.0, 0.0], [2.0, 0.0],
        [0.0, 1.0], [1.0, 1.0], [2.0, 1.0],
        [0.0, 2.0], [1.0, 2.0], [2.0, 2.0]
    ],
    "Elements": [
        { "shape": "square", "node_ids": [0, 1, 3, 4] },
        { "shape": "square", "node_ids": [1, 2, 4, 5] },
        { "shape": "square", "node_ids": [3, 4, 6, 7] },
        { "shape": "square", "node_ids": [4, 5, 7, 8] }
    ]
}"#;

const COORDINATES: FieldId = FieldId(0);

fn assert_mapping(mapping: &IntegrationMapping, element: usize, offset: &[f64], differentials: &[f64]) {
    let element_mapping = mapping.get(element).unwrap();
    for (found, expected) in element_mapping.offset.iter().zip(offset) {
        assert_relative_eq!(*found, *expected, epsilon = 1e-12);
    }
    for (found, expected) in element_mapping.differentials.iter().zip(differentials) {
        assert_relative_eq!(*found, *expected, epsilon = 1e-12);
    }
}

/// A 2D Field with one constant value per Element
fn piecewise_constant(region: &Region, values: &[f64]) -> FiniteElementField {
    let basis = Arc::new(TensorBasis::linear_lagrange(2).unwrap());
    let mut field = FiniteElementField::new("rate", 1);
    for (element, value) in values.iter().enumerate() {
        let mut eft = ElementFieldTemplate::new(basis.clone());
        field
            .define_on_element(&region.mesh, element, std::slice::from_mut(&mut eft), &[], &[])
            .unwrap();
        field.set_element_parameters(element, 0, &[*value; 4]).unwrap();
    }
    field
}

#[test]
fn unit_chain() {
    let mut region = Region::from_json_str(CHAIN).unwrap();
    let one = region.add_constant_field("one", &[1.0]);

    let integration = region
        .define_integration_field("distance", 0, one, COORDINATES)
        .unwrap();
    let mapping = region.integration_field(integration).unwrap().mapping();

    assert_eq!(mapping.visit_order(), &[0, 1, 2]);
    for element in 0..3 {
        assert_mapping(mapping, element, &[element as f64], &[1.0]);
    }

    let value = region.evaluate_at(integration, 2, &[0.25], true).unwrap();
    assert_relative_eq!(value.values[0], 2.25, epsilon = 1e-12);
    assert_relative_eq!(value.derivatives.unwrap()[(0, 0)], 1.0, epsilon = 1e-12);
}

#[test]
fn chain_from_middle_seed() {
    let mut region = Region::from_json_str(CHAIN).unwrap();
    let one = region.add_constant_field("one", &[1.0]);

    let integration = region
        .define_integration_field_with_rule("distance", 1, one, COORDINATES, QuadratureRule::OnePoint)
        .unwrap();
    let mapping = region.integration_field(integration).unwrap().mapping();

    assert_eq!(mapping.visit_order(), &[1, 0, 2]);
    assert_mapping(mapping, 0, &[-1.0], &[1.0]);
    assert_mapping(mapping, 1, &[0.0], &[1.0]);
    assert_mapping(mapping, 2, &[1.0], &[1.0]);
}

#[test]
fn scaled_grid() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let two = region.add_constant_field("two", &[2.0]);

    let integration = region
        .define_integration_field("grid", 0, two, COORDINATES)
        .unwrap();
    let field = region.integration_field(integration).unwrap();
    assert_eq!(field.number_of_components(), 2);

    let mapping = field.mapping();
    assert_eq!(mapping.len(), 4);
    assert_mapping(mapping, 0, &[0.0, 0.0], &[2.0, 2.0]);
    assert_mapping(mapping, 1, &[2.0, 0.0], &[2.0, 2.0]);
    assert_mapping(mapping, 2, &[0.0, 2.0], &[2.0, 2.0]);
    assert_mapping(mapping, 3, &[2.0, 2.0], &[2.0, 2.0]);

    let value = region.evaluate_at(integration, 3, &[0.5, 0.5], true).unwrap();
    assert_relative_eq!(value.values[0], 3.0, epsilon = 1e-12);
    assert_relative_eq!(value.values[1], 3.0, epsilon = 1e-12);
    let derivatives = value.derivatives.unwrap();
    assert_relative_eq!(derivatives[(0, 0)], 2.0, epsilon = 1e-12);
    assert_relative_eq!(derivatives[(0, 1)], 0.0, epsilon = 1e-12);
    assert_relative_eq!(derivatives[(1, 1)], 2.0, epsilon = 1e-12);
}

#[test]
fn grid_faces_use_parent_mapping() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("grid", 0, one, COORDINATES)
        .unwrap();

    // the face shared by Elements 0 and 1 takes its frame from its first parent
    let shared = region.mesh.element(0).unwrap().faces[1].unwrap();
    assert!(region.field(integration).unwrap().is_defined_on_element(&region.mesh, shared));

    let value = region.evaluate_at(integration, shared, &[0.5], true).unwrap();
    assert_relative_eq!(value.values[0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(value.values[1], 0.5, epsilon = 1e-12);

    let derivatives = value.derivatives.unwrap();
    assert_eq!(derivatives.shape(), (2, 1));
    assert_relative_eq!(derivatives[(1, 0)], 1.0, epsilon = 1e-12);
}

#[test]
fn first_mapped_element_wins() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let rate = piecewise_constant(&region, &[1.0, 1.0, 3.0, 1.0]);
    let rate = region.add_finite_element_field(rate);

    let integration = region
        .define_integration_field("grid", 0, rate, COORDINATES)
        .unwrap();
    let mapping = region.integration_field(integration).unwrap().mapping();

    assert_eq!(mapping.visit_order(), &[0, 1, 2, 3]);
    assert_mapping(mapping, 1, &[1.0, 0.0], &[1.0, 1.0]);
    assert_mapping(mapping, 2, &[0.0, 1.0], &[3.0, 3.0]);
    // reached from Element 1 first; Element 2 would have placed it at (3, 1)
    assert_mapping(mapping, 3, &[1.0, 1.0], &[1.0, 1.0]);
}

#[test]
fn builds_are_deterministic() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let rate = piecewise_constant(&region, &[1.0, 2.0, 3.0, 4.0]);
    let rate = region.add_finite_element_field(rate);

    let first = IntegrationMapping::build(&region, 3, rate, COORDINATES, QuadratureRule::TwoPoint).unwrap();
    let second = IntegrationMapping::build(&region, 3, rate, COORDINATES, QuadratureRule::TwoPoint).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.visit_order()[0], 3);
}

#[test]
fn upwind_time_step() {
    let mut region = Region::from_json_str(CHAIN).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("flow", 1, one, COORDINATES)
        .unwrap();

    region.update_integration_time_step(integration, 0.5).unwrap();
    let mapping = region.integration_field(integration).unwrap().mapping();

    assert_mapping(mapping, 1, &[0.5], &[0.0]);
    assert_mapping(mapping, 0, &[-1.5], &[2.0]);
    assert_mapping(mapping, 2, &[0.5], &[1.0]);
}

#[test]
fn upwind_step_entry_face() {
    let previous = ElementMapping {
        offset: smallvec![0.0],
        differentials: smallvec![1.0],
    };
    let from = ElementMapping {
        offset: smallvec![0.0],
        differentials: smallvec![1.0],
    };

    let updated = upwind_step(&previous, &from, 0, 0.5, 1.0);
    assert_relative_eq!(updated.offset[0], -0.5);
    assert_relative_eq!(updated.differentials[0], 0.5);
}

#[test]
fn time_steps_need_a_1d_mesh() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("grid", 0, one, COORDINATES)
        .unwrap();
    let before = region.integration_field(integration).unwrap().mapping().clone();

    assert_eq!(
        region.update_integration_time_step(integration, 0.5),
        Err(IntegrationError::NotOneDimensional(2))
    );
    assert_eq!(region.integration_field(integration).unwrap().mapping(), &before);
    assert_eq!(
        region.update_integration_time_step(one, 0.5),
        Err(IntegrationError::NotIntegrationField(one))
    );
}

#[test]
fn failed_rebuild_keeps_previous_mapping() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("grid", 0, one, COORDINATES)
        .unwrap();
    let before = region.integration_field(integration).unwrap().mapping().clone();

    // only defined on Element 0, so the traversal fails at its first neighbour
    let mut partial = FiniteElementField::new("partial", 1);
    let mut eft = ElementFieldTemplate::new(Arc::new(TensorBasis::linear_lagrange(2).unwrap()));
    partial
        .define_on_element(&region.mesh, 0, std::slice::from_mut(&mut eft), &[], &[])
        .unwrap();
    partial.set_element_parameters(0, 0, &[5.0; 4]).unwrap();
    let partial = region.add_finite_element_field(partial);

    assert!(matches!(
        region.redefine_integration_field(integration, 0, partial, COORDINATES),
        Err(IntegrationError::Evaluation(_))
    ));
    let field = region.integration_field(integration).unwrap();
    assert_eq!(field.mapping(), &before);
    assert_eq!(field.integrand(), one);

    assert_eq!(
        region.redefine_integration_field(integration, 0, integration, COORDINATES),
        Err(IntegrationError::SelfReference(integration))
    );

    region
        .redefine_integration_field(integration, 3, one, COORDINATES)
        .unwrap();
    let field = region.integration_field(integration).unwrap();
    assert_eq!(field.seed(), 3);
    assert_eq!(field.name(), "grid");
    assert_mapping(field.mapping(), 0, &[-1.0, -1.0], &[1.0, 1.0]);
}

#[test]
fn invalid_sources() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let pair = region.add_constant_field("pair", &[1.0, 2.0]);
    let quad = region.add_constant_field("quad", &[1.0, 2.0, 3.0, 4.0]);

    assert_eq!(
        region.define_integration_field("bad", 40, one, COORDINATES),
        Err(IntegrationError::SeedNotFound(40))
    );
    assert_eq!(
        region.define_integration_field("bad", 5, one, COORDINATES),
        Err(IntegrationError::SeedNotTopLevel(5))
    );
    assert_eq!(
        region.define_integration_field("bad", 0, pair, COORDINATES),
        Err(IntegrationError::IntegrandNotScalar(2))
    );
    assert_eq!(
        region.define_integration_field("bad", 0, one, quad),
        Err(IntegrationError::InvalidCoordinateComponents(4))
    );
    let none = region.add_constant_field("none", &[]);
    assert_eq!(
        region.define_integration_field("bad", 0, one, none),
        Err(IntegrationError::InvalidCoordinateComponents(0))
    );
    assert_eq!(region.number_of_fields(), 5);
}

#[test]
fn xi_texture_coordinates_on_uneven_chain() {
    let mut region = Region::from_json_str(
        r#"{
        "Nodes": [[0.0], [2.5], [3.0]],
        "Elements": [
            { "shape": "line", "node_ids": [0, 1] },
            { "shape": "line", "node_ids": [1, 2] }
        ]
    }"#,
    )
    .unwrap();

    let texture = region.define_xi_texture_coordinates("texture", 0).unwrap();
    let mapping = region.integration_field(texture).unwrap().mapping();
    assert_mapping(mapping, 0, &[0.0], &[1.0]);
    assert_mapping(mapping, 1, &[1.0], &[1.0]);

    let mut cache = FieldCache::new();
    let location = region
        .find_integration_element_xi(texture, &[1.25], &mut cache)
        .unwrap();
    assert_eq!(location.element, 1);
    assert_relative_eq!(location.xi[0], 0.25, epsilon = 1e-12);

    let value = region.evaluate(texture, &mut cache, false).unwrap();
    assert_relative_eq!(value.values[0], 1.25, epsilon = 1e-12);
    let position = region.evaluate(COORDINATES, &mut cache, false).unwrap();
    assert_relative_eq!(position.values[0], 2.625, epsilon = 1e-12);

    let xi = region.find_field_by_name("xi").unwrap();
    let xi_values = region.evaluate(xi, &mut cache, true).unwrap();
    assert_eq!(xi_values.values, vec![0.25, 0.0, 0.0]);
    assert_eq!(xi_values.derivatives.as_ref().unwrap()[(0, 0)], 1.0);

    // sources are shared between texture fields
    assert_eq!(region.number_of_fields(), 4);
    region.define_xi_texture_coordinates("again", 1).unwrap();
    assert_eq!(region.number_of_fields(), 5);
}

#[test]
fn find_element_xi_through_cache() {
    let mut region = Region::from_json_str(GRID).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("grid", 0, one, COORDINATES)
        .unwrap();

    let mut cache = FieldCache::new();
    let location = region
        .find_integration_element_xi(integration, &[1.5, 0.25], &mut cache)
        .unwrap();
    assert_eq!(location, ElementXi::new(1, &[0.5, 0.25]));
    assert_eq!(cache.location(), Some(&location));

    let value = region.evaluate(integration, &mut cache, false).unwrap();
    assert_relative_eq!(value.values[0], 1.5, epsilon = 1e-12);
    assert_relative_eq!(value.values[1], 0.25, epsilon = 1e-12);

    assert_eq!(
        region.find_integration_element_xi(integration, &[2.5, 0.0], &mut cache),
        Err(IntegrationError::NoMappingForValues)
    );
    assert_eq!(cache.location(), Some(&location));
}

#[cfg(feature = "json_export")]
#[test]
fn export_mapping() {
    let mut region = Region::from_json_str(CHAIN).unwrap();
    let one = region.add_constant_field("one", &[1.0]);
    let integration = region
        .define_integration_field("distance", 2, one, COORDINATES)
        .unwrap();

    let exported = region.integration_field(integration).unwrap().mapping().to_json();
    assert_eq!(exported["elements"].len(), 3);
    assert_eq!(exported["elements"][0]["element"].as_usize(), Some(2));
    assert_eq!(exported["elements"][2]["offset"][0].as_f64(), Some(-2.0));
    assert_eq!(exported["elements"][2]["differentials"][0].as_f64(), Some(1.0));
}

#[test]
fn cube_pair_from_file() {
    let mut region = Region::from_file("./test_input/cube_pair.json").unwrap();
    let half = region.add_constant_field("half", &[0.5]);

    let integration = region
        .define_integration_field("volume", 1, half, COORDINATES)
        .unwrap();
    let field = region.integration_field(integration).unwrap();
    assert_eq!(field.number_of_components(), 3);
    assert_mapping(field.mapping(), 1, &[0.0, 0.0, 0.0], &[0.5, 0.5, 0.5]);
    assert_mapping(field.mapping(), 0, &[-0.5, 0.0, 0.0], &[0.5, 0.5, 0.5]);

    let value = region.evaluate_at(integration, 0, &[1.0, 0.5, 0.25], false).unwrap();
    assert_relative_eq!(value.values[0], 0.0, epsilon = 1e-12);
    assert_relative_eq!(value.values[1], 0.25, epsilon = 1e-12);
    assert_relative_eq!(value.values[2], 0.125, epsilon = 1e-12);
}
