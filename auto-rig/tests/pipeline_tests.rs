//! End-to-end rigging of the reference character

mod common;

use approx::assert_relative_eq;
use auto_rig::{
    AutoRigger, BoneSchema, DegeneracyReason, DistanceBlend, Error, JointId, Mesh, MeshSource,
    ObjSource, Region, RigSettings, StrategyKind, Vector3D, ZoneThresholds,
};

fn settings(strategy: StrategyKind) -> RigSettings {
    let mut settings = RigSettings::default();
    settings.strategy = strategy;
    settings
}

fn assert_weights_well_formed(output: &auto_rig::RigOutput, max_influences: usize) {
    assert_eq!(output.weights.len(), common::humanoid_points().len());
    for (vertex, weights) in output.weights.iter().enumerate() {
        assert!(!weights.is_empty(), "vertex {vertex} is unweighted");
        assert!(
            weights.len() <= max_influences,
            "vertex {vertex} has {} influences",
            weights.len()
        );
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-4);
        for influence in weights {
            assert!(
                influence.weight > 0.01,
                "vertex {vertex} keeps insignificant weight {}",
                influence.weight
            );
        }
    }
    assert!(output.verification.is_clean());
}

#[test]
fn test_hips_placement() {
    let output = AutoRigger::new().rig(&common::humanoid_mesh()).unwrap();
    let hips = output.skeleton.get(JointId::Hips).unwrap();
    assert_relative_eq!(hips.head.x, 0.0);
    assert_relative_eq!(hips.head.y, -1.78 + 0.21 * 3.25, epsilon = 1e-5);
    assert_relative_eq!(hips.head.z, 0.0);
    assert_eq!(output.skeleton.root().id, JointId::Hips);
    assert_eq!(output.skeleton.len(), 23);
}

#[test]
fn test_zone_weighting() {
    let output = AutoRigger::new().rig(&common::humanoid_mesh()).unwrap();
    assert_eq!(output.strategy, StrategyKind::Zone);
    assert_eq!(output.attempts.len(), 1);
    assert!(output.degeneracy.is_empty());
    // The largest torso list has five candidates.
    assert_weights_well_formed(&output, 5);
}

#[test]
fn test_inverse_square_weighting() {
    let output = AutoRigger::new()
        .with_settings(settings(StrategyKind::Distance))
        .rig(&common::humanoid_mesh())
        .unwrap();
    assert_eq!(output.strategy, StrategyKind::Distance);
    assert_weights_well_formed(&output, 4);
}

#[test]
fn test_nearest_pair_weighting() {
    let mut settings = settings(StrategyKind::Distance);
    settings.distance.blend = DistanceBlend::NearestPair;
    let output = AutoRigger::new()
        .with_settings(settings)
        .rig(&common::humanoid_mesh())
        .unwrap();
    assert_weights_well_formed(&output, 2);
}

#[test]
fn test_envelope_weighting_or_fallback() {
    let output = AutoRigger::new()
        .with_settings(settings(StrategyKind::Envelope))
        .rig(&common::humanoid_mesh())
        .unwrap();
    assert_eq!(output.attempts[0].strategy, StrategyKind::Envelope);
    assert_ne!(output.strategy, StrategyKind::Zone);
    assert_weights_well_formed(&output, 4);
}

#[test]
fn test_vertex_on_joint_head_snaps() {
    let rigger = AutoRigger::new().with_settings(settings(StrategyKind::Distance));
    let first = rigger.rig(&common::humanoid_mesh()).unwrap();
    let hand = first.skeleton.get(JointId::LeftHand).unwrap().head;

    let mut points = common::humanoid_points();
    points.push(hand);
    let output = rigger.rig(&Mesh::new("with-hand", points)).unwrap();
    assert_eq!(output.skeleton, first.skeleton);

    let last = output.weights.get(output.weights.len() - 1).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last.weight_for(JointId::LeftHand), 1.0);
}

#[test]
fn test_rigging_is_idempotent() {
    for strategy in [StrategyKind::Zone, StrategyKind::Distance, StrategyKind::Envelope] {
        let rigger = AutoRigger::new().with_settings(settings(strategy));
        let a = rigger.rig(&common::humanoid_mesh()).unwrap();
        let b = rigger.rig(&common::humanoid_mesh()).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let mut sequential = settings(StrategyKind::Distance);
    sequential.parallel = false;
    let a = AutoRigger::new()
        .with_settings(sequential)
        .rig(&common::humanoid_mesh())
        .unwrap();
    let b = AutoRigger::new()
        .with_settings(settings(StrategyKind::Distance))
        .rig(&common::humanoid_mesh())
        .unwrap();
    assert_eq!(a.weights, b.weights);
}

#[test]
fn test_zone_fallback_is_counted() {
    let mut settings = RigSettings::default();
    for bone in &mut settings.zones.torso {
        bone.center = 5.0;
    }
    let mesh = common::humanoid_mesh();
    let output = AutoRigger::new().with_settings(settings).rig(&mesh).unwrap();

    let bounds = mesh.world_aabb();
    let thresholds = ZoneThresholds::default();
    let torso: Vec<usize> = mesh
        .vertices()
        .iter()
        .enumerate()
        .filter(|(_, p)| thresholds.classify_point(**p, &bounds) == Region::Torso)
        .map(|(i, _)| i)
        .collect();
    assert!(!torso.is_empty());

    assert_eq!(
        output.degeneracy.count(DegeneracyReason::BelowThreshold, Region::Torso),
        torso.len()
    );
    assert_eq!(output.degeneracy.total(), torso.len());
    for &vertex in &torso {
        let weights = output.weights.get(vertex).unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights.weight_for(JointId::Spine), 1.0);
    }
}

#[test]
fn test_head_classification() {
    let mesh = common::humanoid_mesh();
    let bounds = mesh.world_aabb();
    let point = Vector3D::new(0.05 * 0.6, -1.78 + 0.85 * 3.25, 0.0);
    assert_eq!(
        ZoneThresholds::default().classify_point(point, &bounds),
        Region::Head
    );
}

#[test]
fn test_zone_profile_checked_before_solving() {
    let rows = BoneSchema::humanoid()
        .joints()
        .iter()
        .copied()
        .filter(|d| !matches!(d.id, JointId::HeadTop))
        .collect();
    let err = AutoRigger::new()
        .with_schema(BoneSchema::new(rows))
        .rig(&common::humanoid_mesh())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownZoneJoint {
            region: Region::Head,
            joint: JointId::HeadTop
        }
    ));
    assert!(err.is_configuration());
}

#[test]
fn test_ancestor_chains_reach_hips() {
    let output = AutoRigger::new().rig(&common::humanoid_mesh()).unwrap();
    for joint in &output.skeleton {
        let depth = output.skeleton.depth(joint.id).unwrap();
        assert!(depth < output.skeleton.len());
        if let Some(top) = output.skeleton.ancestors(joint.id).last() {
            assert_eq!(top.id, JointId::Hips);
        }
    }
}

#[test]
fn test_every_clip_is_generated() {
    let output = AutoRigger::new().rig(&common::humanoid_mesh()).unwrap();
    let names: Vec<_> = output.clips.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Walk", "Idle", "Run", "Work", "Wave"]);
    assert!(output.clips.iter().all(|c| c.is_seamless()));
    assert!(output.clips.iter().all(|c| c.frames_per_second == 24.0));
}

#[test]
fn test_obj_source_end_to_end() {
    let mut source = ObjSource::from_bytes(common::humanoid_obj());
    let mesh = source.load_mesh().unwrap();
    assert_eq!(mesh.name(), "humanoid");
    assert_eq!(mesh.vertices(), common::humanoid_points().as_slice());
    assert!(!mesh.triangles().is_empty());

    let output = AutoRigger::new()
        .rig_source(&mut ObjSource::from_bytes(common::humanoid_obj()))
        .unwrap();
    let direct = AutoRigger::new().rig(&common::humanoid_mesh()).unwrap();
    assert_eq!(output.weights, direct.weights);
}

#[test]
fn test_obj_with_infinite_coordinate_is_rejected() {
    let mut text = common::humanoid_obj();
    text.push_str("v 0 inf 0\n");
    let err = AutoRigger::new()
        .rig_source(&mut ObjSource::from_bytes(text))
        .unwrap_err();
    assert!(matches!(err, Error::MeshParse { .. }), "{err}");
}
