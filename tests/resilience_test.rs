use betwise::hardening::*;
use betwise::types::*;

#[tokio::test]
async fn test_retry_policy_success() {
    let policy = RetryPolicy::new(3, 1);
    let mut attempts = 0;

    let result: betwise::types::Result<i32> = policy
        .execute_with_retry(|| {
            attempts += 1;
            async move { Ok(42) }
        })
        .await;

    match result {
        Ok(val) => assert_eq!(val, 42),
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_retry_policy_eventual_success() {
    let policy = RetryPolicy::new(3, 1);
    let mut attempts = 0;

    let result: betwise::types::Result<i32> = policy
        .execute_with_retry(|| {
            attempts += 1;
            let a = attempts;
            async move {
                if a < 3 {
                    Err(BetwiseError::Io(std::io::Error::other("connection reset")).into())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    match result {
        Ok(val) => assert_eq!(val, 42),
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_validation_errors_are_not_retried() {
    let policy = RetryPolicy::new(4, 1);
    let mut attempts = 0;

    let result: betwise::types::Result<i32> = policy
        .execute_with_retry(|| {
            attempts += 1;
            async move { Err(BetwiseError::Validation("bad input".to_string()).into()) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_rate_limit_retried_until_exhausted() {
    let policy = RetryPolicy::new(2, 1);
    let mut attempts = 0;

    let result: betwise::types::Result<i32> = policy
        .execute_with_retry(|| {
            attempts += 1;
            async move {
                Err(BetwiseError::Upstream(
                    reqwest::StatusCode::TOO_MANY_REQUESTS,
                    "rate limited".to_string(),
                )
                .into())
            }
        })
        .await;

    match result {
        Err(e) => assert!(matches!(e.inner, BetwiseError::Upstream(s, _) if s.as_u16() == 429)),
        Ok(_) => panic!("Expected the last error to surface"),
    }
    assert_eq!(attempts, 2);
}
