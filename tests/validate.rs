pub mod common;

use viamilter::{
    config::DEFAULT_SIGN_HEADERS, Config, ConfigError, Mode, Options, Paths, PrivateKeys,
    ResolveError,
};

async fn resolve(options: &Options) -> Result<Config, ResolveError> {
    Config::resolve(options, &Paths::default(), &common::scenario_secrets()).await
}

fn invalid(result: Result<Config, ResolveError>) -> ConfigError {
    match result {
        Err(ResolveError::Invalid(error)) => error,
        other => panic!("expected invalid configuration, got {other:?}"),
    }
}

#[tokio::test]
async fn all_empty_options_are_reported_together() {
    let error = invalid(resolve(&Options::default()).await);

    assert_eq!(
        error.to_string(),
        "empty signingtable configuration - empty keytable configuration \
         - empty private-keys configuration"
    );
}

#[tokio::test]
async fn malformed_inputs_are_reported_together() {
    let options = Options {
        signing_table: Some("][".into()),
        key_table: Some("][".into()),
        private_keys: None,
    };

    let message = invalid(resolve(&options).await).to_string();

    assert!(message.contains("wrong signingtable format"));
    assert!(message.contains("wrong keytable format"));
    assert!(message.contains("empty private-keys configuration"));
}

#[tokio::test]
async fn wrong_arity_key_table_row_is_a_format_error() {
    let mut options = common::scenario_options();
    options.key_table = Some(r#"[["sel._domainkey.example.com", "example.com", "sel"]]"#.into());

    let message = invalid(resolve(&options).await).to_string();

    assert_eq!(message, "wrong keytable format");
}

#[tokio::test]
async fn defaults_are_applied() {
    let config = resolve(&common::scenario_options()).await.unwrap();

    assert_eq!(config.canonicalization, "relaxed/relaxed");
    assert_eq!(config.socket, "inet:8892");
    assert_eq!(config.internal_hosts, "0.0.0.0/0");
    assert_eq!(config.sign_headers, DEFAULT_SIGN_HEADERS);
    assert_eq!(config.mode, Mode::SignAndVerify);
    assert!(config.signing_enabled());
}

#[tokio::test]
async fn split_key_table_rows_are_equivalent_to_compound_rows() {
    let mut options = common::scenario_options();
    options.key_table = Some(
        r#"[["sel._domainkey.example.com", "example.com", "sel", "/etc/dkimkeys/k1.private"]]"#
            .into(),
    );

    let split = resolve(&options).await.unwrap();
    let compound = resolve(&common::scenario_options()).await.unwrap();

    assert_eq!(split.key_table, compound.key_table);
}

#[tokio::test]
async fn empty_tables_fail_assembled_validation() {
    let mut options = common::scenario_options();
    options.signing_table = Some("[]".into());
    options.key_table = Some("[]".into());

    let error = invalid(resolve(&options).await);

    assert_eq!(
        error.to_string(),
        "wrong config options: signingtable,keytable."
    );
}

#[tokio::test]
async fn dangling_key_reference_fails_validation() {
    let mut options = common::scenario_options();
    options.key_table = Some(
        r#"[["sel._domainkey.example.com", "example.com:sel:/etc/dkimkeys/WRONGNAME.private"]]"#
            .into(),
    );

    let error = invalid(resolve(&options).await);

    assert_eq!(error.to_string(), "wrong config options: keytable.");
}

#[tokio::test]
async fn key_name_with_path_separator_fails_validation() {
    let secrets = common::MemorySecrets::default();
    let mut keys = PrivateKeys::new();
    keys.insert("k1".into(), "PEMDATA".into());
    keys.insert("../evil".into(), "PEMDATA".into());
    secrets.insert("opendkim-keys", keys);

    let result =
        Config::resolve(&common::scenario_options(), &Paths::default(), &secrets).await;

    assert_eq!(
        invalid(result).to_string(),
        "wrong config options: private-keys."
    );
}

#[tokio::test]
async fn secret_reference_prefix_is_stripped() {
    // scenario_options carries `secret:opendkim-keys`, the store only knows
    // `opendkim-keys`; resolution succeeding proves the prefix handling.
    let config = resolve(&common::scenario_options()).await.unwrap();

    assert_eq!(config.private_keys.get("k1").map(String::as_str), Some("PEMDATA"));
}
