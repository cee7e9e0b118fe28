//! Project and component scaffolding.
//!
//! These handlers generate files from templates instead of spawning
//! processes. Filesystem failures are reported in the envelope, mirroring the
//! execution tools' "never raise past the boundary" behavior.

use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{ToolResponse, error_response, text_response};
use crate::validate;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;

const ROOT_BUILD_GRADLE: &str = r#"plugins {
    id("com.android.application") version "{{AGP_VERSION}}" apply false
    id("org.jetbrains.kotlin.android") version "{{KOTLIN_VERSION}}" apply false
    {{COMPOSE_PLUGIN}}
}
"#;

const SETTINGS_GRADLE: &str = r#"pluginManagement {
    repositories {
        google()
        mavenCentral()
        gradlePluginPortal()
    }
}
dependencyResolutionManagement {
    repositoriesMode.set(RepositoriesMode.FAIL_ON_PROJECT_REPOS)
    repositories {
        google()
        mavenCentral()
    }
}

rootProject.name = "{{PROJECT_NAME}}"
include(":app")
"#;

const APP_BUILD_GRADLE: &str = r#"plugins {
    id("com.android.application")
    id("org.jetbrains.kotlin.android")
    {{COMPOSE_PLUGIN}}
}

android {
    namespace = "{{PACKAGE_NAME}}"
    compileSdk = {{TARGET_SDK}}

    defaultConfig {
        applicationId = "{{PACKAGE_NAME}}"
        minSdk = {{MIN_SDK}}
        targetSdk = {{TARGET_SDK}}
        versionCode = 1
        versionName = "1.0"
    }

    buildTypes {
        release {
            isMinifyEnabled = false
            proguardFiles(getDefaultProguardFile("proguard-android-optimize.txt"), "proguard-rules.pro")
        }
    }

    {{BUILD_FEATURES}}

    compileOptions {
        sourceCompatibility = JavaVersion.VERSION_11
        targetCompatibility = JavaVersion.VERSION_11
    }
    kotlinOptions {
        jvmTarget = "11"
    }
}

dependencies {
    implementation("androidx.core:core-ktx:1.15.0")
    {{DEPENDENCIES}}
}
"#;

const ANDROID_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android">

    <application
        android:label="@string/app_name"
        android:supportsRtl="true"
        android:theme="{{THEME}}">
        <activity
            android:name=".MainActivity"
            android:exported="true">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
                <category android:name="android.intent.category.LAUNCHER" />
            </intent-filter>
        </activity>
    </application>

</manifest>
"#;

const MAIN_ACTIVITY_COMPOSE: &str = r#"package {{PACKAGE_NAME}}

import android.os.Bundle
import androidx.activity.ComponentActivity
import androidx.activity.compose.setContent
import androidx.compose.foundation.layout.fillMaxSize
import androidx.compose.material3.MaterialTheme
import androidx.compose.material3.Surface
import androidx.compose.material3.Text
import androidx.compose.runtime.Composable
import androidx.compose.ui.Modifier
import androidx.compose.ui.tooling.preview.Preview

class MainActivity : ComponentActivity() {
    override fun onCreate(savedInstanceState: Bundle?) {
        super.onCreate(savedInstanceState)
        setContent {
            MaterialTheme {
                Surface(modifier = Modifier.fillMaxSize()) {
                    Greeting("{{PROJECT_NAME}}")
                }
            }
        }
    }
}

@Composable
fun Greeting(name: String, modifier: Modifier = Modifier) {
    Text(text = "Hello $name!", modifier = modifier)
}

@Preview(showBackground = true)
@Composable
fun GreetingPreview() {
    MaterialTheme {
        Greeting("{{PROJECT_NAME}}")
    }
}
"#;

const MAIN_ACTIVITY_VIEWS: &str = r#"package {{PACKAGE_NAME}}

import android.os.Bundle
import androidx.appcompat.app.AppCompatActivity
import {{PACKAGE_NAME}}.databinding.ActivityMainBinding

class MainActivity : AppCompatActivity() {

    private lateinit var binding: ActivityMainBinding

    override fun onCreate(savedInstanceState: Bundle?) {
        super.onCreate(savedInstanceState)
        binding = ActivityMainBinding.inflate(layoutInflater)
        setContentView(binding.root)
    }
}
"#;

const ACTIVITY_MAIN_LAYOUT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<androidx.constraintlayout.widget.ConstraintLayout xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:app="http://schemas.android.com/apk/res-auto"
    xmlns:tools="http://schemas.android.com/tools"
    android:layout_width="match_parent"
    android:layout_height="match_parent"
    tools:context="{{PACKAGE_NAME}}.MainActivity">

    <TextView
        android:layout_width="wrap_content"
        android:layout_height="wrap_content"
        android:text="Hello World!"
        app:layout_constraintBottom_toBottomOf="parent"
        app:layout_constraintEnd_toEndOf="parent"
        app:layout_constraintStart_toStartOf="parent"
        app:layout_constraintTop_toTopOf="parent" />

</androidx.constraintlayout.widget.ConstraintLayout>
"#;

const GRADLE_PROPERTIES: &str = r#"org.gradle.jvmargs=-Xmx2048m -Dfile.encoding=UTF-8
android.useAndroidX=true
kotlin.code.style=official
android.nonTransitiveRClass=true
"#;

const GRADLE_WRAPPER_PROPERTIES: &str = r#"distributionBase=GRADLE_USER_HOME
distributionPath=wrapper/dists
distributionUrl=https\://services.gradle.org/distributions/gradle-8.9-bin.zip
networkTimeout=10000
validateDistributionUrl=true
zipStoreBase=GRADLE_USER_HOME
zipStorePath=wrapper/dists
"#;

const GRADLEW_SH: &str = "#!/usr/bin/env sh\n# Gradle startup script for POSIX\nexec gradle \"$@\"\n";

const GRADLEW_BAT: &str = "@rem Gradle startup script for Windows\ngradle %*\n";

const GITIGNORE: &str = r#"*.iml
.gradle
/local.properties
/.idea
.DS_Store
/build
/captures
.externalNativeBuild
.cxx
local.properties
"#;

const ACTIVITY_TEMPLATE: &str = r#"package {{PACKAGE_NAME}}

import android.os.Bundle
import androidx.appcompat.app.AppCompatActivity

class {{ACTIVITY_NAME}} : AppCompatActivity() {

    override fun onCreate(savedInstanceState: Bundle?) {
        super.onCreate(savedInstanceState)
        setContentView(R.layout.{{LAYOUT_NAME}})
    }
}
"#;

const ACTIVITY_LAYOUT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<androidx.constraintlayout.widget.ConstraintLayout xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:app="http://schemas.android.com/apk/res-auto"
    xmlns:tools="http://schemas.android.com/tools"
    android:layout_width="match_parent"
    android:layout_height="match_parent"
    tools:context="{{PACKAGE_NAME}}.{{ACTIVITY_NAME}}">

</androidx.constraintlayout.widget.ConstraintLayout>
"#;

const FRAGMENT_TEMPLATE: &str = r#"package {{PACKAGE_NAME}}

import android.os.Bundle
import android.view.LayoutInflater
import android.view.View
import android.view.ViewGroup
import androidx.fragment.app.Fragment

class {{FRAGMENT_NAME}} : Fragment() {

    override fun onCreateView(
        inflater: LayoutInflater,
        container: ViewGroup?,
        savedInstanceState: Bundle?,
    ): View? {
        return inflater.inflate(R.layout.{{LAYOUT_NAME}}, container, false)
    }

    companion object {
        fun newInstance() = {{FRAGMENT_NAME}}()
    }
}
"#;

const FRAGMENT_LAYOUT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FrameLayout xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    android:layout_width="match_parent"
    android:layout_height="match_parent"
    tools:context="{{PACKAGE_NAME}}.{{FRAGMENT_NAME}}">

</FrameLayout>
"#;

const COMPOSE_SCREEN_TEMPLATE: &str = r#"package {{PACKAGE_NAME}}

import androidx.compose.foundation.layout.fillMaxSize
import androidx.compose.material3.MaterialTheme
import androidx.compose.material3.Surface
import androidx.compose.material3.Text
import androidx.compose.runtime.Composable
import androidx.compose.ui.Modifier
import androidx.compose.ui.tooling.preview.Preview

@Composable
fun {{SCREEN_NAME}}Screen(modifier: Modifier = Modifier) {
    Surface(modifier = modifier.fillMaxSize()) {
        Text(text = "{{SCREEN_NAME}}")
    }
}

@Preview(showBackground = true)
@Composable
fun {{SCREEN_NAME}}ScreenPreview() {
    MaterialTheme {
        {{SCREEN_NAME}}Screen()
    }
}
"#;

const VIEWMODEL_TEMPLATE: &str = r#"package {{PACKAGE_NAME}}

import androidx.lifecycle.ViewModel
import kotlinx.coroutines.flow.MutableStateFlow
import kotlinx.coroutines.flow.StateFlow
import kotlinx.coroutines.flow.asStateFlow

data class {{SCREEN_NAME}}UiState(
    val isLoading: Boolean = false,
)

class {{SCREEN_NAME}}ViewModel : ViewModel() {

    private val _uiState = MutableStateFlow({{SCREEN_NAME}}UiState())
    val uiState: StateFlow<{{SCREEN_NAME}}UiState> = _uiState.asStateFlow()
}
"#;

/// Substitute `{{KEY}}` placeholders.
fn render(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in replacements {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// `DetailView` -> `detail_view`; spaces and hyphens collapse to underscores.
fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch == ' ' || ch == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase();
        }
    }
    out
}

fn default_min_sdk() -> u32 {
    24
}

fn default_target_sdk() -> u32 {
    35
}

fn default_true() -> bool {
    true
}

fn default_agp_version() -> String {
    "8.7.3".to_string()
}

fn default_kotlin_version() -> String {
    "2.1.0".to_string()
}

fn default_app_module() -> String {
    "app".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectArgs {
    pub project_name: String,
    pub package_name: String,
    pub parent_dir: String,
    #[serde(default = "default_min_sdk")]
    pub min_sdk: u32,
    #[serde(default = "default_target_sdk")]
    pub target_sdk: u32,
    #[serde(default = "default_true")]
    pub use_compose: bool,
    #[serde(default = "default_agp_version")]
    pub agp_version: String,
    #[serde(default = "default_kotlin_version")]
    pub kotlin_version: String,
}

pub async fn project_create(
    _tc: &Toolchain,
    args: CreateProjectArgs,
) -> Result<ToolResponse, ToolError> {
    let parent_dir = validate::validate_absolute_path(&args.parent_dir, "Parent directory")?;
    let package_name = validate::validate_package_name(&args.package_name)?;
    let project_name = validate::validate_safe_name(&args.project_name, "Project name")?;

    let project_dir = parent_dir.join(&project_name);
    if project_dir.exists() {
        return Ok(error_response(format!(
            "Directory already exists: {project_dir}"
        )));
    }

    match write_project_tree(&args, &project_dir, &project_name, &package_name) {
        Ok(created) => {
            let listing = created
                .iter()
                .map(|f| format!("  - {f}"))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(text_response(format!(
                "Project \"{project_name}\" created at: {project_dir}\n\n\
                 Type: {}\nPackage: {package_name}\nMin SDK: {}\nTarget SDK: {}\n\n\
                 Files created:\n{listing}\n\n\
                 Note: Run 'gradle wrapper' in the project directory to download the proper \
                 Gradle wrapper JAR.",
                if args.use_compose { "Jetpack Compose" } else { "XML Views" },
                args.min_sdk,
                args.target_sdk,
            )))
        }
        Err(e) => Ok(error_response(format!("Failed to create project: {e}"))),
    }
}

fn write_project_tree(
    args: &CreateProjectArgs,
    project_dir: &Utf8Path,
    project_name: &str,
    package_name: &str,
) -> std::io::Result<Vec<String>> {
    let package_path = package_name.replace('.', "/");
    let main_dir = project_dir.join("app/src/main");

    for dir in [
        project_dir.to_path_buf(),
        main_dir.join("java").join(&package_path),
        main_dir.join("res/layout"),
        main_dir.join("res/values"),
        main_dir.join("res/mipmap-hdpi"),
        main_dir.join("res/mipmap-mdpi"),
        main_dir.join("res/mipmap-xhdpi"),
        main_dir.join("res/mipmap-xxhdpi"),
        main_dir.join("res/mipmap-xxxhdpi"),
        project_dir.join("app/src/test/java").join(&package_path),
        project_dir.join("app/src/androidTest/java").join(&package_path),
        project_dir.join("gradle/wrapper"),
    ] {
        fs::create_dir_all(dir)?;
    }

    let (root_compose_plugin, app_compose_plugin) = if args.use_compose {
        (
            format!(
                "id(\"org.jetbrains.kotlin.plugin.compose\") version \"{}\" apply false",
                args.kotlin_version
            ),
            "id(\"org.jetbrains.kotlin.plugin.compose\")".to_string(),
        )
    } else {
        (String::new(), String::new())
    };

    let build_features = if args.use_compose {
        "buildFeatures {\n        compose = true\n    }"
    } else {
        "buildFeatures {\n        viewBinding = true\n    }"
    };

    let dependencies = if args.use_compose {
        [
            r#"implementation(platform("androidx.compose:compose-bom:2024.12.01"))"#,
            r#"implementation("androidx.compose.ui:ui")"#,
            r#"implementation("androidx.compose.ui:ui-graphics")"#,
            r#"implementation("androidx.compose.ui:ui-tooling-preview")"#,
            r#"implementation("androidx.compose.material3:material3")"#,
            r#"implementation("androidx.activity:activity-compose:1.9.3")"#,
            r#"debugImplementation("androidx.compose.ui:ui-tooling")"#,
        ]
        .join("\n    ")
    } else {
        [
            r#"implementation("androidx.appcompat:appcompat:1.7.0")"#,
            r#"implementation("com.google.android.material:material:1.12.0")"#,
            r#"implementation("androidx.constraintlayout:constraintlayout:2.2.0")"#,
        ]
        .join("\n    ")
    };

    let theme = if args.use_compose {
        "@android:style/Theme.Material.Light.NoActionBar"
    } else {
        "@style/Theme.AppCompat.Light.DarkActionBar"
    };

    let min_sdk = args.min_sdk.to_string();
    let target_sdk = args.target_sdk.to_string();
    let replacements: &[(&str, &str)] = &[
        ("PROJECT_NAME", project_name),
        ("PACKAGE_NAME", package_name),
        ("MIN_SDK", &min_sdk),
        ("TARGET_SDK", &target_sdk),
        ("AGP_VERSION", &args.agp_version),
        ("KOTLIN_VERSION", &args.kotlin_version),
        ("BUILD_FEATURES", build_features),
        ("DEPENDENCIES", &dependencies),
        ("THEME", theme),
    ];

    let mut root_replacements = replacements.to_vec();
    root_replacements.push(("COMPOSE_PLUGIN", root_compose_plugin.as_str()));
    fs::write(
        project_dir.join("build.gradle.kts"),
        render(ROOT_BUILD_GRADLE, &root_replacements),
    )?;
    fs::write(
        project_dir.join("settings.gradle.kts"),
        render(SETTINGS_GRADLE, replacements),
    )?;

    let mut app_replacements = replacements.to_vec();
    app_replacements.push(("COMPOSE_PLUGIN", app_compose_plugin.as_str()));
    fs::write(
        project_dir.join("app/build.gradle.kts"),
        render(APP_BUILD_GRADLE, &app_replacements),
    )?;
    fs::write(
        main_dir.join("AndroidManifest.xml"),
        render(ANDROID_MANIFEST, replacements),
    )?;

    let main_activity = if args.use_compose {
        MAIN_ACTIVITY_COMPOSE
    } else {
        MAIN_ACTIVITY_VIEWS
    };
    fs::write(
        main_dir.join("java").join(&package_path).join("MainActivity.kt"),
        render(main_activity, replacements),
    )?;

    if !args.use_compose {
        fs::write(
            main_dir.join("res/layout/activity_main.xml"),
            render(ACTIVITY_MAIN_LAYOUT, replacements),
        )?;
    }

    fs::write(
        main_dir.join("res/values/strings.xml"),
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    \
             <string name=\"app_name\">{project_name}</string>\n</resources>\n"
        ),
    )?;
    fs::write(project_dir.join("gradle.properties"), GRADLE_PROPERTIES)?;
    fs::write(
        project_dir.join("gradle/wrapper/gradle-wrapper.properties"),
        GRADLE_WRAPPER_PROPERTIES,
    )?;

    let gradlew = project_dir.join("gradlew");
    fs::write(&gradlew, GRADLEW_SH)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&gradlew, fs::Permissions::from_mode(0o755))?;
    }
    fs::write(project_dir.join("gradlew.bat"), GRADLEW_BAT)?;
    fs::write(project_dir.join(".gitignore"), GITIGNORE)?;
    fs::write(project_dir.join("app/proguard-rules.pro"), "")?;

    let mut created = vec![
        "build.gradle.kts".to_string(),
        "settings.gradle.kts".to_string(),
        "gradle.properties".to_string(),
        "gradlew".to_string(),
        ".gitignore".to_string(),
        "app/build.gradle.kts".to_string(),
        "app/src/main/AndroidManifest.xml".to_string(),
        format!("app/src/main/java/{package_path}/MainActivity.kt"),
        "app/src/main/res/values/strings.xml".to_string(),
    ];
    if !args.use_compose {
        created.push("app/src/main/res/layout/activity_main.xml".to_string());
    }
    created.push("gradle/wrapper/gradle-wrapper.properties".to_string());
    Ok(created)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldActivityArgs {
    pub project_dir: String,
    pub activity_name: String,
    pub package_name: String,
    #[serde(default = "default_true")]
    pub layout: bool,
    #[serde(default = "default_app_module")]
    pub module: String,
}

pub async fn scaffold_activity(
    _tc: &Toolchain,
    args: ScaffoldActivityArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let package_name = validate::validate_package_name(&args.package_name)?;
    let activity_name = validate::validate_safe_name(&args.activity_name, "Activity name")?;

    let package_path = package_name.replace('.', "/");
    let java_dir = source_dir(&project_dir, &args.module, &package_path);
    let layout_name = format!(
        "activity_{}",
        to_snake_case(activity_name.strip_suffix("Activity").unwrap_or(&activity_name))
    );

    let result: std::io::Result<Vec<String>> = (|| {
        fs::create_dir_all(&java_dir)?;

        let activity_path = java_dir.join(format!("{activity_name}.kt"));
        if activity_path.exists() {
            return Ok(vec![]);
        }
        fs::write(
            &activity_path,
            render(
                ACTIVITY_TEMPLATE,
                &[
                    ("PACKAGE_NAME", package_name.as_str()),
                    ("ACTIVITY_NAME", activity_name.as_str()),
                    ("LAYOUT_NAME", layout_name.as_str()),
                ],
            ),
        )?;
        let mut created = vec![format!(
            "{}/src/main/java/{package_path}/{activity_name}.kt",
            args.module
        )];

        if args.layout {
            let layout_dir = layout_res_dir(&project_dir, &args.module);
            fs::create_dir_all(&layout_dir)?;
            fs::write(
                layout_dir.join(format!("{layout_name}.xml")),
                render(
                    ACTIVITY_LAYOUT_TEMPLATE,
                    &[
                        ("PACKAGE_NAME", package_name.as_str()),
                        ("ACTIVITY_NAME", activity_name.as_str()),
                    ],
                ),
            )?;
            created.push(format!(
                "{}/src/main/res/layout/{layout_name}.xml",
                args.module
            ));
        }
        Ok(created)
    })();

    match result {
        Ok(created) if created.is_empty() => Ok(error_response(format!(
            "File already exists: {}",
            java_dir.join(format!("{activity_name}.kt"))
        ))),
        Ok(created) => Ok(text_response(format!(
            "Activity \"{activity_name}\" created.\n\nFiles:\n{}\n\n\
             Remember to register the activity in AndroidManifest.xml.",
            bullet_list(&created)
        ))),
        Err(e) => Ok(error_response(format!("Failed to create activity: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldFragmentArgs {
    pub project_dir: String,
    pub fragment_name: String,
    pub package_name: String,
    #[serde(default = "default_true")]
    pub layout: bool,
    #[serde(default = "default_app_module")]
    pub module: String,
}

pub async fn scaffold_fragment(
    _tc: &Toolchain,
    args: ScaffoldFragmentArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let package_name = validate::validate_package_name(&args.package_name)?;
    let fragment_name = validate::validate_safe_name(&args.fragment_name, "Fragment name")?;

    let package_path = package_name.replace('.', "/");
    let java_dir = source_dir(&project_dir, &args.module, &package_path);
    let layout_name = format!(
        "fragment_{}",
        to_snake_case(fragment_name.strip_suffix("Fragment").unwrap_or(&fragment_name))
    );

    let result: std::io::Result<Vec<String>> = (|| {
        fs::create_dir_all(&java_dir)?;

        let fragment_path = java_dir.join(format!("{fragment_name}.kt"));
        if fragment_path.exists() {
            return Ok(vec![]);
        }
        fs::write(
            &fragment_path,
            render(
                FRAGMENT_TEMPLATE,
                &[
                    ("PACKAGE_NAME", package_name.as_str()),
                    ("FRAGMENT_NAME", fragment_name.as_str()),
                    ("LAYOUT_NAME", layout_name.as_str()),
                ],
            ),
        )?;
        let mut created = vec![format!(
            "{}/src/main/java/{package_path}/{fragment_name}.kt",
            args.module
        )];

        if args.layout {
            let layout_dir = layout_res_dir(&project_dir, &args.module);
            fs::create_dir_all(&layout_dir)?;
            fs::write(
                layout_dir.join(format!("{layout_name}.xml")),
                render(
                    FRAGMENT_LAYOUT_TEMPLATE,
                    &[
                        ("PACKAGE_NAME", package_name.as_str()),
                        ("FRAGMENT_NAME", fragment_name.as_str()),
                    ],
                ),
            )?;
            created.push(format!(
                "{}/src/main/res/layout/{layout_name}.xml",
                args.module
            ));
        }
        Ok(created)
    })();

    match result {
        Ok(created) if created.is_empty() => Ok(error_response(format!(
            "File already exists: {}",
            java_dir.join(format!("{fragment_name}.kt"))
        ))),
        Ok(created) => Ok(text_response(format!(
            "Fragment \"{fragment_name}\" created.\n\nFiles:\n{}",
            bullet_list(&created)
        ))),
        Err(e) => Ok(error_response(format!("Failed to create fragment: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldComposeScreenArgs {
    pub project_dir: String,
    pub screen_name: String,
    pub package_name: String,
    #[serde(default = "default_app_module")]
    pub module: String,
    #[serde(default)]
    pub include_view_model: bool,
}

pub async fn scaffold_compose_screen(
    _tc: &Toolchain,
    args: ScaffoldComposeScreenArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let package_name = validate::validate_package_name(&args.package_name)?;
    let screen_name = validate::validate_safe_name(&args.screen_name, "Screen name")?;

    let package_path = package_name.replace('.', "/");
    let java_dir = source_dir(&project_dir, &args.module, &package_path);

    let result: std::io::Result<Vec<String>> = (|| {
        fs::create_dir_all(&java_dir)?;

        let screen_path = java_dir.join(format!("{screen_name}Screen.kt"));
        if screen_path.exists() {
            return Ok(vec![]);
        }
        fs::write(
            &screen_path,
            render(
                COMPOSE_SCREEN_TEMPLATE,
                &[
                    ("PACKAGE_NAME", package_name.as_str()),
                    ("SCREEN_NAME", screen_name.as_str()),
                ],
            ),
        )?;
        let mut created = vec![format!(
            "{}/src/main/java/{package_path}/{screen_name}Screen.kt",
            args.module
        )];

        if args.include_view_model {
            fs::write(
                java_dir.join(format!("{screen_name}ViewModel.kt")),
                render(
                    VIEWMODEL_TEMPLATE,
                    &[
                        ("PACKAGE_NAME", package_name.as_str()),
                        ("SCREEN_NAME", screen_name.as_str()),
                    ],
                ),
            )?;
            created.push(format!(
                "{}/src/main/java/{package_path}/{screen_name}ViewModel.kt",
                args.module
            ));
        }
        Ok(created)
    })();

    match result {
        Ok(created) if created.is_empty() => Ok(error_response(format!(
            "File already exists: {}",
            java_dir.join(format!("{screen_name}Screen.kt"))
        ))),
        Ok(created) => Ok(text_response(format!(
            "Compose screen \"{screen_name}\" created.\n\nFiles:\n{}",
            bullet_list(&created)
        ))),
        Err(e) => Ok(error_response(format!(
            "Failed to create compose screen: {e}"
        ))),
    }
}

fn source_dir(project_dir: &Utf8Path, module: &str, package_path: &str) -> Utf8PathBuf {
    project_dir
        .join(module)
        .join("src/main/java")
        .join(package_path)
}

fn layout_res_dir(project_dir: &Utf8Path, module: &str) -> Utf8PathBuf {
    project_dir.join(module).join("src/main/res/layout")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("DetailView"), "detail_view");
        assert_eq!(to_snake_case("Profile"), "profile");
        assert_eq!(to_snake_case("My-Cool Screen"), "my_cool_screen");
        assert_eq!(to_snake_case("HTTPServer"), "httpserver");
    }

    #[test]
    fn render_substitutes_all_occurrences() {
        let out = render(
            "package {{PKG}};\n// {{PKG}}",
            &[("PKG", "com.example.app")],
        );
        assert_eq!(out, "package com.example.app;\n// com.example.app");
    }
}
