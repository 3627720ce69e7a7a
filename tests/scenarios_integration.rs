//! End-to-end scenarios exercising the parser/geometry/reconstruction stack
//! together, against in-memory elements rather than a live Overpass endpoint.

use osm_power_units::cache::ElementCache;
use osm_power_units::config::Config;
use osm_power_units::geometry_handler::GeometryHandler;
use osm_power_units::model::element::{
    MemberType, Node, OsmElement, Relation, RelationMember, Tags,
};
use osm_power_units::model::geometry::{point_shape, PlantGeometry};
use osm_power_units::parsing::{GeneratorOutcome, GeneratorParser, PlantParser};
use osm_power_units::rejection::RejectionTracker;

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn node(id: i64, lat: f64, lon: f64, tags: Tags) -> OsmElement {
    OsmElement::Node(Node {
        id,
        lat,
        lon,
        tags,
        country: Some("DE".into()),
    })
}

/// S1 — a well-formed plant node produces exactly one unit with the tagged
/// fueltype, technology, capacity and start year, and no rejection.
#[test]
fn s1_basic_parse_produces_a_unit() {
    let cfg = Config::default();
    let parser = PlantParser::new(&cfg);
    let cache = ElementCache::new(std::env::temp_dir());
    let mut rejections = RejectionTracker::new();

    let element = node(
        1,
        48.0,
        11.0,
        tags(&[
            ("power", "plant"),
            ("plant:source", "solar"),
            ("plant:method", "photovoltaic"),
            ("name", "Alpha"),
            ("plant:output:electricity", "5 MW"),
            ("start_date", "2019"),
        ]),
    );

    let unit = parser
        .process_element(&element, &cache, &mut rejections)
        .expect("well-formed plant should parse");

    assert_eq!(unit.fueltype.as_deref(), Some("Solar"));
    assert_eq!(unit.technology.as_deref(), Some("PV"));
    assert_eq!(unit.capacity, Some(5.0));
    assert_eq!(unit.date_in.as_deref(), Some("2019"));
    assert!(rejections.is_empty());
}

/// S2 — a placeholder capacity value is rejected before any advanced-pass
/// attempt, and produces no unit.
#[test]
fn s2_placeholder_capacity_is_rejected() {
    let mut cfg = Config::default();
    cfg.capacity_extraction.enabled = true;
    let parser = PlantParser::new(&cfg);
    let cache = ElementCache::new(std::env::temp_dir());
    let mut rejections = RejectionTracker::new();

    let element = node(
        2,
        48.0,
        11.0,
        tags(&[
            ("power", "plant"),
            ("plant:source", "solar"),
            ("plant:method", "photovoltaic"),
            ("name", "Beta"),
            ("plant:output:electricity", "yes"),
        ]),
    );

    let unit = parser.process_element(&element, &cache, &mut rejections);
    assert!(unit.is_none());
    assert_eq!(rejections.len(), 1);
    assert_eq!(
        rejections.summary().get(&osm_power_units::model::rejection::RejectionReason::CapacityPlaceholder),
        Some(&1)
    );
}

/// S3 — a comma-as-decimal-separator value is rejected as an ambiguous
/// format, with the raw value carried as keywords and a dot-corrected
/// suggestion carried as details.
#[test]
fn s3_decimal_comma_is_rejected_with_a_suggested_correction() {
    let mut cfg = Config::default();
    cfg.capacity_extraction.enabled = true;
    let parser = PlantParser::new(&cfg);
    let cache = ElementCache::new(std::env::temp_dir());
    let mut rejections = RejectionTracker::new();

    let element = node(
        3,
        48.0,
        11.0,
        tags(&[
            ("power", "plant"),
            ("plant:source", "solar"),
            ("plant:method", "photovoltaic"),
            ("name", "Gamma"),
            ("plant:output:electricity", "3,5 MW"),
        ]),
    );

    let unit = parser.process_element(&element, &cache, &mut rejections);
    assert!(unit.is_none());
    let entry = rejections.iter().next().expect("one rejection recorded");
    assert_eq!(
        entry.reason,
        osm_power_units::model::rejection::RejectionReason::CapacityDecimalFormat
    );
    assert_eq!(entry.keywords, "3,5 MW");
    assert_eq!(entry.details.as_deref(), Some("3.5 MW"));
}

/// S4 — a plant relation missing its name tag resolves its own `members`,
/// finds two generator-tagged ones, and reconstructs inline inside
/// `PlantParser::process_element` rather than being rejected outright.
#[test]
fn s4_relation_reconstructs_inline_from_its_own_generator_members() {
    let mut cfg = Config::default();
    cfg.units_reconstruction.enabled = true;
    let mut cache = ElementCache::new(std::env::temp_dir());

    let generator_a = Node {
        id: 11,
        lat: 48.0,
        lon: 11.0,
        tags: tags(&[
            ("power", "generator"),
            ("generator:source", "solar"),
            ("name", "Solar Park Alpha"),
            ("generator:output:electricity", "2 MW"),
        ]),
        country: Some("DE".into()),
    };
    let generator_b = Node {
        id: 12,
        lat: 48.01,
        lon: 11.01,
        tags: tags(&[
            ("power", "generator"),
            ("generator:source", "solar"),
            ("name", "Solar Park Beta"),
            ("generator:output:electricity", "2 MW"),
        ]),
        country: Some("DE".into()),
    };
    cache.store_node(generator_a.clone());
    cache.store_node(generator_b.clone());

    let relation = OsmElement::Relation(Relation {
        id: 900,
        members: vec![
            RelationMember {
                member_type: MemberType::Node,
                ref_id: generator_a.id,
                role: "generator".to_string(),
            },
            RelationMember {
                member_type: MemberType::Node,
                ref_id: generator_b.id,
                role: "generator".to_string(),
            },
        ],
        tags: tags(&[
            ("power", "plant"),
            ("plant:source", "solar"),
            ("plant:method", "photovoltaic"),
        ]),
        country: Some("DE".into()),
        lat: Some(48.005),
        lon: Some(11.005),
    });

    let plant_parser = PlantParser::new(&cfg);
    let mut rejections = RejectionTracker::new();
    let unit = plant_parser
        .process_element(&relation, &cache, &mut rejections)
        .expect("relation missing a name should reconstruct inline from its own generator members");

    assert_eq!(unit.capacity, Some(4.0));
    assert_eq!(unit.generator_count, Some(2));
    assert_eq!(
        unit.capacity_source.as_deref(),
        Some("reconstructed_from_generators")
    );
    assert!(rejections.is_empty());
}

/// A relation missing a name with only one qualifying generator member falls
/// below the reconstruction minimum and is rejected like any other
/// incomplete plant, rather than reconstructing from an insufficient group.
#[test]
fn s4_relation_with_too_few_generator_members_is_rejected_normally() {
    let mut cfg = Config::default();
    cfg.units_reconstruction.enabled = true;
    let mut cache = ElementCache::new(std::env::temp_dir());

    let generator_a = Node {
        id: 21,
        lat: 48.0,
        lon: 11.0,
        tags: tags(&[
            ("power", "generator"),
            ("generator:source", "solar"),
            ("name", "Solar Park Alpha"),
            ("generator:output:electricity", "2 MW"),
        ]),
        country: Some("DE".into()),
    };
    cache.store_node(generator_a.clone());

    let relation = OsmElement::Relation(Relation {
        id: 901,
        members: vec![RelationMember {
            member_type: MemberType::Node,
            ref_id: generator_a.id,
            role: "generator".to_string(),
        }],
        tags: tags(&[
            ("power", "plant"),
            ("plant:source", "solar"),
            ("plant:method", "photovoltaic"),
        ]),
        country: Some("DE".into()),
        lat: Some(48.0),
        lon: Some(11.0),
    });

    let plant_parser = PlantParser::new(&cfg);
    let mut rejections = RejectionTracker::new();
    let unit = plant_parser.process_element(&relation, &cache, &mut rejections);
    assert!(unit.is_none());
    assert_eq!(rejections.len(), 1);
}

/// S5 — a plant relation rejected for lacking a source tag still leaves its
/// polygon behind; two generators found inside it are routed to that
/// geometry's salvage group instead of parsing standalone, and that group
/// salvages into one plant unit with summed capacity and the rejected
/// element's identity.
#[test]
fn s5_salvage_from_a_rejected_plant_geometry() {
    let mut cfg = Config::default();
    cfg.units_reconstruction.enabled = true;
    let mut cache = ElementCache::new(std::env::temp_dir());
    let pts = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
    for (i, (lat, lon)) in pts.iter().enumerate() {
        cache.store_node(Node {
            id: i as i64 + 1,
            lat: *lat,
            lon: *lon,
            tags: Tags::new(),
            country: None,
        });
    }
    let plant_way_id = 100;
    cache.store_ways(vec![osm_power_units::model::element::Way {
        id: plant_way_id,
        nodes: vec![1, 2, 3, 4],
        tags: tags(&[("power", "plant")]),
        country: Some("DE".into()),
        lat: None,
        lon: None,
    }]);
    let rejected_plant = OsmElement::Way(osm_power_units::model::element::Way {
        id: plant_way_id,
        nodes: vec![1, 2, 3, 4],
        tags: tags(&[("power", "plant")]),
        country: Some("DE".into()),
        lat: None,
        lon: None,
    });

    let plant_parser = PlantParser::new(&cfg);
    let mut rejections = RejectionTracker::new();
    let unit = plant_parser.process_element(&rejected_plant, &cache, &mut rejections);
    assert!(unit.is_none(), "plant without a source tag must be rejected");

    let rejected_geometry = GeometryHandler::get_element_geometry(&rejected_plant, &cache)
        .expect("rejected plant geometry survives for salvage");

    let generator_parser = GeneratorParser::new(&cfg);
    let generators = [
        node(
            21,
            0.5,
            0.4,
            tags(&[
                ("power", "generator"),
                ("generator:source", "wind"),
                ("generator:output:electricity", "1.5 MW"),
            ]),
        ),
        node(
            22,
            0.4,
            0.6,
            tags(&[
                ("power", "generator"),
                ("generator:source", "wind"),
                ("generator:output:electricity", "2.5 MW"),
            ]),
        ),
    ];

    let mut total_capacity = 0.0;
    let mut inside_count = 0u32;
    for generator in &generators {
        assert!(rejected_geometry.contains_point(
            generator.derived_coordinates().0.unwrap(),
            generator.derived_coordinates().1.unwrap(),
            None
        ));
        let mut gen_rejections = RejectionTracker::new();
        let outcome = generator_parser.process_element(
            generator,
            &cache,
            &[],
            &[rejected_geometry.clone()],
            &mut gen_rejections,
        );
        let (rejected_plant_id, orphan) = match outcome {
            GeneratorOutcome::SalvageMatch {
                rejected_plant_id,
                generator,
            } => (rejected_plant_id, generator),
            _ => panic!("generator inside a rejected plant's geometry should be salvaged, not parsed standalone"),
        };
        assert_eq!(rejected_plant_id, rejected_geometry.id);
        total_capacity += orphan.capacity_mw;
        inside_count += 1;
        assert!(gen_rejections.is_empty());
    }
    assert_eq!(total_capacity, 4.0);
    assert_eq!(inside_count, 2);

    let salvaged = plant_parser.salvage_from_rejected_geometry(
        &rejected_geometry,
        Some("DE".to_string()),
        "Wind".to_string(),
        None,
        total_capacity,
        inside_count,
    );
    assert_eq!(salvaged.capacity, Some(4.0));
    assert_eq!(salvaged.fueltype.as_deref(), Some("Wind"));
    assert_eq!(
        salvaged.capacity_source.as_deref(),
        Some("aggregated_from_orphaned_generators")
    );
    assert_eq!(salvaged.project_id, format!("rejected_plant/way/{plant_way_id}"));
}

/// S6 — a generator sitting inside an already-accepted plant's geometry is
/// rejected as `within-existing-plant` and never becomes its own unit.
#[test]
fn s6_generator_inside_existing_plant_is_rejected() {
    let cfg = Config::default();
    let cache = ElementCache::new(std::env::temp_dir());

    let plant_geometry = PlantGeometry::new(
        "way/200",
        osm_power_units::model::element::ElementType::Way,
        point_shape(48.0, 11.0),
    );

    let generator_parser = GeneratorParser::new(&cfg);
    let mut rejections = RejectionTracker::new();
    let generator = node(
        31,
        48.0,
        11.0,
        tags(&[
            ("power", "generator"),
            ("generator:source", "solar"),
            ("generator:output:electricity", "1 MW"),
        ]),
    );

    let outcome = generator_parser.process_element(
        &generator,
        &cache,
        &[plant_geometry],
        &[],
        &mut rejections,
    );
    assert!(matches!(outcome, GeneratorOutcome::Rejected));
    assert_eq!(rejections.len(), 1);
    let entry = rejections.iter().next().unwrap();
    assert_eq!(
        entry.reason,
        osm_power_units::model::rejection::RejectionReason::WithinExistingPlant
    );
}

/// S5, end to end — the same rejected-plant salvage scenario as above, but
/// driven through `Workflow::process_country` against a stubbed Overpass
/// transport, so the routing inside `GeneratorParser::process_element` and
/// the `finalize_salvage` aggregation are both exercised the way a real run
/// would hit them rather than through direct, hand-sequenced method calls.
#[tokio::test]
async fn s5_salvage_runs_end_to_end_through_process_country() {
    use std::sync::Arc;

    use osm_power_units::overpass::transport::stub::StubTransport;
    use osm_power_units::overpass::OverpassClient;
    use osm_power_units::workflow::Workflow;

    let mut cfg = Config::default();
    cfg.units_reconstruction.enabled = true;

    let transport = Arc::new(StubTransport::new(vec![
        Ok(serde_json::json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 0.0, "lon": 0.0, "tags": {}},
                {"type": "node", "id": 2, "lat": 0.0, "lon": 1.0, "tags": {}},
                {"type": "node", "id": 3, "lat": 1.0, "lon": 1.0, "tags": {}},
                {"type": "node", "id": 4, "lat": 1.0, "lon": 0.0, "tags": {}},
                {"type": "way", "id": 100, "nodes": [1, 2, 3, 4], "tags": {"power": "plant"}},
            ]
        })),
        Ok(serde_json::json!({
            "elements": [
                {"type": "node", "id": 21, "lat": 0.5, "lon": 0.4, "tags": {
                    "power": "generator", "generator:source": "wind",
                    "generator:output:electricity": "1.5 MW"
                }},
                {"type": "node", "id": 22, "lat": 0.4, "lon": 0.6, "tags": {
                    "power": "generator", "generator:source": "wind",
                    "generator:output:electricity": "2.5 MW"
                }},
            ]
        })),
    ]));
    let overpass = OverpassClient::new(transport, &cfg);
    let workflow = Workflow::new(cfg, overpass);
    let dir = tempfile::tempdir().unwrap();
    let mut cache = ElementCache::new(dir.path());
    let mut rejections = RejectionTracker::new();

    workflow
        .process_country("DE", &mut cache, &mut rejections)
        .await
        .unwrap();

    let units = cache.get_units("DE").unwrap();
    assert!(
        units.iter().all(|u| u.unit_type.as_deref() != Some("generator")),
        "no individual generator units should survive once their plant is salvaged"
    );
    let plants: Vec<_> = units
        .iter()
        .filter(|u| u.unit_type.as_deref() == Some("plant"))
        .collect();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0].capacity, Some(4.0));
    assert_eq!(plants[0].project_id, "rejected_plant/way/100");
    assert_eq!(
        plants[0].capacity_source.as_deref(),
        Some("aggregated_from_orphaned_generators")
    );
}

/// A relation whose members are unresolvable in the cache still falls back
/// to a point at its own derived coordinates rather than failing outright.
#[test]
fn relation_without_resolvable_members_falls_back_to_its_own_point() {
    let cache = ElementCache::new(std::env::temp_dir());
    let relation = OsmElement::Relation(Relation {
        id: 500,
        members: vec![RelationMember {
            member_type: MemberType::Way,
            ref_id: 999,
            role: "outline".to_string(),
        }],
        tags: tags(&[("power", "plant")]),
        country: Some("DE".into()),
        lat: Some(48.5),
        lon: Some(11.5),
    });
    let geometry = GeometryHandler::get_element_geometry(&relation, &cache)
        .expect("falls back to the relation's own derived point");
    assert_eq!(geometry.centroid(), Some((48.5, 11.5)));
}
