use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cns_harness::fakes::NmAgentClientFake;
use cns_harness::nmagent::{HomeAzResponse, NcVersion, NcVersionListResponse, NmAgentClient};
use cns_harness::Error;

fn versions() -> NcVersionListResponse {
    NcVersionListResponse {
        containers: vec![NcVersion {
            network_container_id: "nc-1".into(),
            version: "7".into(),
        }],
    }
}

#[tokio::test]
async fn fake_forwards_configured_responses() {
    let fake = NmAgentClientFake::new(
        || Ok(versions()),
        || {
            Ok(HomeAzResponse {
                home_az: 2,
                api_version: 1,
            })
        },
    );

    assert_eq!(fake.get_nc_version_list().await.unwrap(), versions());
    assert_eq!(fake.get_home_az_info().await.unwrap().home_az, 2);
}

#[tokio::test]
async fn fake_forwards_errors() {
    let fake = NmAgentClientFake::new(
        || Err(Error::nmagent("nc list unavailable")),
        || Err(Error::nmagent("wireserver unreachable")),
    );

    let err = fake.get_nc_version_list().await.unwrap_err();
    assert!(matches!(err, Error::NmAgent(ref m) if m == "nc list unavailable"));
    let err = fake.get_home_az_info().await.unwrap_err();
    assert!(err.to_string().contains("wireserver unreachable"));
}

#[tokio::test]
async fn fake_calls_the_closure_on_every_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fake = NmAgentClientFake::new(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(NcVersionListResponse::default())
        },
        || Ok(HomeAzResponse::default()),
    );

    let client: &dyn NmAgentClient = &fake;
    for _ in 0..3 {
        assert!(client.get_nc_version_list().await.unwrap().containers.is_empty());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn responses_use_camel_case_on_the_wire() {
    let parsed: NcVersionListResponse = serde_json::from_str(
        r#"{"containers":[{"networkContainerId":"nc-1","version":"7"}]}"#,
    )
    .unwrap();
    assert_eq!(parsed, versions());

    let parsed: HomeAzResponse = serde_json::from_str(r#"{"homeAz":3}"#).unwrap();
    assert_eq!(parsed.home_az, 3);
    assert_eq!(parsed.api_version, 0);
}
