//! Smoke tests for the pb-app service layer.

use std::path::PathBuf;

use pb_app::{
    AxesDef, AxisDef, BalanceConfig, DisturbanceDef, WeightChangeDef, WeightsDef, load_config,
    run, save_config, synthesize_once,
};
use pb_control::SynthesisOutcome;

fn config_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // crates
    path.pop(); // repo root
    path.push("configs");
    path.push(name);
    path
}

#[test]
fn shipped_configs_load_and_synthesize() {
    for name in ["spatial.yaml", "planar.yaml"] {
        let cfg = load_config(&config_path(name)).expect("config should load");
        let ctx = synthesize_once(&cfg).expect("synthesis should succeed");
        assert!(ctx.spectral_abscissa() < 0.0, "{name}");
    }
}

#[test]
fn yaml_roundtrip_preserves_config() {
    let mut cfg = BalanceConfig::new("roundtrip", AxesDef::Spatial);
    cfg.run.disturbances.push(DisturbanceDef {
        at_s: 1.0,
        duration_s: 0.2,
        axis: AxisDef::Y,
        force_n: -5.0,
    });

    let path = std::env::temp_dir().join(format!("pb_roundtrip_{}.yaml", std::process::id()));
    save_config(&path, &cfg).unwrap();
    let loaded = load_config(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, cfg);
}

#[test]
fn minimal_yaml_fills_defaults() {
    let cfg: BalanceConfig = serde_yaml::from_str("version: 1\nname: tiny\n").unwrap();
    assert_eq!(cfg.axes, AxesDef::Spatial);
    assert_eq!(cfg.weights, WeightsDef::default());
    assert_eq!(cfg.run.dt_s, 0.01);
    pb_app::validate_config(&cfg).unwrap();
}

#[test]
fn spatial_run_balances_through_pushes() {
    let mut cfg = BalanceConfig::new("pushes", AxesDef::Spatial);
    cfg.run.t_end_s = 8.0;
    cfg.run.disturbances = vec![
        DisturbanceDef {
            at_s: 2.0,
            duration_s: 0.1,
            axis: AxisDef::X,
            force_n: 5.0,
        },
        DisturbanceDef {
            at_s: 3.0,
            duration_s: 0.1,
            axis: AxisDef::Y,
            force_n: -5.0,
        },
    ];

    let record = run(&cfg).unwrap();
    let s = &record.summary;
    assert_eq!(s.ticks, 800);
    assert_eq!(s.syntheses_ok, 1);
    assert_eq!(s.syntheses_failed, 0);
    assert!(!s.fell);
    assert!(s.max_abs_tilt_rad < 0.15);
    assert!(s.final_abs_tilt_rad < 0.02);
    assert_eq!(record.t.len(), 800);
    assert!(record.to_csv().starts_with("t_s,p_x,p_y,theta_x,theta_y"));
}

#[test]
fn failed_weight_change_keeps_balancing() {
    let mut cfg = BalanceConfig::new("stale", AxesDef::Planar);
    cfg.run.t_end_s = 6.0;
    cfg.run.weight_changes.push(WeightChangeDef {
        at_s: 1.0,
        weights: WeightsDef {
            control: 0.0,
            ..WeightsDef::default()
        },
    });

    let record = run(&cfg).unwrap();
    assert_eq!(record.syntheses.len(), 2);
    assert!(matches!(
        record.syntheses[1].outcome,
        SynthesisOutcome::Failed(_)
    ));
    assert!((record.syntheses[1].t - 1.0).abs() < 1e-9);
    assert!(!record.summary.fell);
    assert!(record.summary.final_abs_tilt_rad < 0.05);
}

#[test]
fn uncontrolled_axis_falls_without_synthesis() {
    // a singular R from the start leaves the controller without a gain
    let mut cfg = BalanceConfig::new("no-gain", AxesDef::Planar);
    cfg.weights.control = 0.0;
    cfg.run.t_end_s = 3.0;
    let record = run(&cfg).unwrap();
    assert_eq!(record.summary.syntheses_failed, 1);
    assert!(record.u.iter().all(|u| u.iter().all(|v| *v == 0.0)));
    assert!(record.summary.fell);
}
