use lib_ecogate::configs::PolicyService;
use lib_ecogate::models::SensitivityLevel;
use project_tests::{Deployment, site};

#[tokio::test]
async fn overrides_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policies.json");

    {
        let deployment =
            Deployment::with_policies(vec![site("lake", 100, SensitivityLevel::Low)], PolicyService::load(&path))
                .unwrap();
        deployment
            .engine
            .set_capacity_override("lake", 0.25, true, None, "ranger")
            .await
            .unwrap();
        assert_eq!(deployment.policies.version(), 2);
    }

    let reloaded = PolicyService::load(&path);
    let entry = reloaded.override_for("lake").unwrap();
    assert_eq!(entry.multiplier, 0.25);
    assert_eq!(entry.author, "ranger");
    assert_eq!(reloaded.version(), 2);
}

#[tokio::test]
async fn corrupt_policy_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policies.json");
    std::fs::write(&path, "{ definitely not json").unwrap();

    let deployment =
        Deployment::with_policies(vec![site("ridge", 100, SensitivityLevel::High)], PolicyService::load(&path))
            .unwrap();

    let decision = deployment.engine.is_booking_allowed("ridge", 1).await.unwrap();
    assert!(decision.allowed);
    assert!(decision.requires_permit);
    assert_eq!(deployment.policies.version(), 1);
}
