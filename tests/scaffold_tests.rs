//! End-to-end tests for the scaffolding operations, which generate files
//! without spawning processes.

use camino::Utf8PathBuf;
use droidpilot::paths::Toolchain;
use droidpilot::server;
use serde_json::json;

fn fake_toolchain() -> Toolchain {
    Toolchain {
        sdk_root: Utf8PathBuf::from("/nonexistent/sdk"),
        adb: Utf8PathBuf::from("/nonexistent/sdk/platform-tools/adb"),
        emulator: Utf8PathBuf::from("/nonexistent/sdk/emulator/emulator"),
        avdmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/avdmanager"),
        sdkmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/sdkmanager"),
        java_home: None,
    }
}

#[tokio::test]
async fn project_create_writes_a_compose_project() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().to_str().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "project_create",
        json!({
            "projectName": "MyApp",
            "packageName": "com.example.myapp",
            "parentDir": parent,
        }),
    )
    .await;

    assert!(!resp.is_error, "unexpected error: {:?}", resp.first_text());
    let text = resp.first_text().unwrap();
    assert!(text.contains("Project \"MyApp\" created"));
    assert!(text.contains("Jetpack Compose"));

    let project = dir.path().join("MyApp");
    assert!(project.join("gradlew").exists());
    assert!(project.join("settings.gradle.kts").exists());
    assert!(project.join("app/build.gradle.kts").exists());

    let activity = std::fs::read_to_string(
        project.join("app/src/main/java/com/example/myapp/MainActivity.kt"),
    )
    .unwrap();
    assert!(activity.starts_with("package com.example.myapp"));
    assert!(activity.contains("setContent"));

    let app_build =
        std::fs::read_to_string(project.join("app/build.gradle.kts")).unwrap();
    assert!(app_build.contains("namespace = \"com.example.myapp\""));
    assert!(app_build.contains("compose = true"));
    assert!(!app_build.contains("{{"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(project.join("gradlew"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111, "gradlew must be executable");
    }
}

#[tokio::test]
async fn project_create_without_compose_uses_view_binding() {
    let dir = tempfile::tempdir().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "project_create",
        json!({
            "projectName": "ViewsApp",
            "packageName": "com.example.views",
            "parentDir": dir.path().to_str().unwrap(),
            "useCompose": false,
        }),
    )
    .await;
    assert!(!resp.is_error);

    let project = dir.path().join("ViewsApp");
    assert!(project.join("app/src/main/res/layout/activity_main.xml").exists());
    let app_build = std::fs::read_to_string(project.join("app/build.gradle.kts")).unwrap();
    assert!(app_build.contains("viewBinding = true"));
}

#[tokio::test]
async fn project_create_refuses_existing_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("Taken")).unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "project_create",
        json!({
            "projectName": "Taken",
            "packageName": "com.example.taken",
            "parentDir": dir.path().to_str().unwrap(),
        }),
    )
    .await;

    assert!(resp.is_error);
    assert!(resp.first_text().unwrap().contains("Directory already exists"));
}

#[tokio::test]
async fn scaffold_activity_creates_class_and_layout() {
    let dir = tempfile::tempdir().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "scaffold_activity",
        json!({
            "projectDir": dir.path().to_str().unwrap(),
            "activityName": "DetailActivity",
            "packageName": "com.example.myapp",
        }),
    )
    .await;
    assert!(!resp.is_error);

    let class_path = dir
        .path()
        .join("app/src/main/java/com/example/myapp/DetailActivity.kt");
    let class_src = std::fs::read_to_string(&class_path).unwrap();
    assert!(class_src.contains("class DetailActivity : AppCompatActivity()"));
    assert!(class_src.contains("R.layout.activity_detail"));
    assert!(
        dir.path()
            .join("app/src/main/res/layout/activity_detail.xml")
            .exists()
    );

    // A second attempt must refuse to overwrite.
    let resp = server::dispatch(
        &fake_toolchain(),
        "scaffold_activity",
        json!({
            "projectDir": dir.path().to_str().unwrap(),
            "activityName": "DetailActivity",
            "packageName": "com.example.myapp",
        }),
    )
    .await;
    assert!(resp.is_error);
    assert!(resp.first_text().unwrap().contains("File already exists"));
}

#[tokio::test]
async fn scaffold_fragment_can_skip_the_layout() {
    let dir = tempfile::tempdir().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "scaffold_fragment",
        json!({
            "projectDir": dir.path().to_str().unwrap(),
            "fragmentName": "ProfileFragment",
            "packageName": "com.example.myapp",
            "layout": false,
        }),
    )
    .await;
    assert!(!resp.is_error);

    assert!(
        dir.path()
            .join("app/src/main/java/com/example/myapp/ProfileFragment.kt")
            .exists()
    );
    assert!(
        !dir.path()
            .join("app/src/main/res/layout/fragment_profile.xml")
            .exists()
    );
}

#[tokio::test]
async fn scaffold_compose_screen_with_view_model() {
    let dir = tempfile::tempdir().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "scaffold_compose_screen",
        json!({
            "projectDir": dir.path().to_str().unwrap(),
            "screenName": "Profile",
            "packageName": "com.example.myapp",
            "includeViewModel": true,
        }),
    )
    .await;
    assert!(!resp.is_error);

    let screen = std::fs::read_to_string(
        dir.path()
            .join("app/src/main/java/com/example/myapp/ProfileScreen.kt"),
    )
    .unwrap();
    assert!(screen.contains("fun ProfileScreen"));

    let view_model = std::fs::read_to_string(
        dir.path()
            .join("app/src/main/java/com/example/myapp/ProfileViewModel.kt"),
    )
    .unwrap();
    assert!(view_model.contains("class ProfileViewModel : ViewModel()"));
}

#[tokio::test]
async fn scaffold_rejects_hostile_names() {
    let dir = tempfile::tempdir().unwrap();

    let resp = server::dispatch(
        &fake_toolchain(),
        "scaffold_activity",
        json!({
            "projectDir": dir.path().to_str().unwrap(),
            "activityName": "../../../etc/passwd",
            "packageName": "com.example.myapp",
        }),
    )
    .await;
    assert!(resp.is_error);
    assert!(resp.first_text().unwrap().contains("invalid characters"));
}
