use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

/// Release (deployed process) resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Release {
    pub key: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub process_key: Option<String>,
    #[serde(default)]
    pub process_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment_name: Option<String>,
}

/// Job resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    pub id: i64,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

impl Job {
    /// Whether the server reported the job as running
    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("Running")
    }
}

/// Robot license type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RobotType {
    #[default]
    Attended,
    Unattended,
    NonProduction,
    Development,
    Studio,
    StudioX,
    StudioPro,
}

/// How a robot is bound to machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HostingType {
    #[default]
    Standard,
    Floating,
}

/// Machine type; the client only registers standard machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineType {
    #[default]
    Standard,
}

/// Descriptor for a machine to register
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewMachine {
    pub name: String,
    pub description: String,
    #[serde(rename = "Type")]
    pub machine_type: MachineType,
}

impl NewMachine {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            machine_type: MachineType::Standard,
        }
    }
}

/// Descriptor for a robot to register
///
/// The password is only exposed while the request body is serialized; the
/// `Debug` output redacts it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewRobot {
    pub machine_name: String,
    pub name: String,
    pub username: String,
    pub description: String,
    #[serde(rename = "Type")]
    pub robot_type: RobotType,
    pub hosting_type: HostingType,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
}

impl NewRobot {
    /// Create a robot descriptor with the default `Attended` type and `Standard` hosting
    pub fn new(
        machine_name: impl Into<String>,
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            machine_name: machine_name.into(),
            name: name.into(),
            username: username.into(),
            description: description.into(),
            robot_type: RobotType::default(),
            hosting_type: HostingType::default(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn with_robot_type(mut self, robot_type: RobotType) -> Self {
        self.robot_type = robot_type;
        self
    }

    pub fn with_hosting_type(mut self, hosting_type: HostingType) -> Self {
        self.hosting_type = hosting_type;
        self
    }
}

pub(crate) fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}
