use std::str::FromStr;
use crate::chart::domain::ChartMode;
use crate::selection::domain::SensorClass;
use crate::system::domain::ErrorType;


/// Órdenes de línea aceptadas por la consola.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Farm(Option<String>),
    ListFarms,
    User(String),
    Mode(ChartMode),
    Device(SensorClass, Option<String>),
    Reload,
    Show,
    Logout,
    Quit,
}


impl FromStr for ConsoleCommand {
    type Err = ErrorType;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let arg = words.next();

        let parsed = match (command, arg) {
            ("farm", Some("none")) => ConsoleCommand::Farm(None),
            ("farm", Some(id)) => ConsoleCommand::Farm(Some(id.to_string())),
            ("farms", None) => ConsoleCommand::ListFarms,
            ("user", Some(id)) => ConsoleCommand::User(id.to_string()),
            ("mode", Some(mode)) => ConsoleCommand::Mode(mode.parse()?),
            ("device", Some(class)) => {
                let device = words.next().filter(|d| *d != "none").map(str::to_string);
                ConsoleCommand::Device(class.parse()?, device)
            }
            ("reload", None) => ConsoleCommand::Reload,
            ("show", None) => ConsoleCommand::Show,
            ("logout", None) => ConsoleCommand::Logout,
            ("quit" | "exit", None) => ConsoleCommand::Quit,
            _ => return Err(ErrorType::Config(format!("orden desconocida: {}", line.trim()))),
        };
        Ok(parsed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_commands() {
        assert_eq!("farm 12".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Farm(Some("12".into())));
        assert_eq!("farm none".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Farm(None));
        assert_eq!("user u9".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::User("u9".into()));
        assert_eq!("mode soil".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Mode(ChartMode::Soil));
        assert_eq!(
            "device ph p7".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Device(SensorClass::SoilPh, Some("p7".into()))
        );
        assert_eq!(
            "device env none".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Device(SensorClass::Environment, None)
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete_lines() {
        assert!("mode".parse::<ConsoleCommand>().is_err());
        assert!("mode weather".parse::<ConsoleCommand>().is_err());
        assert!("reboot".parse::<ConsoleCommand>().is_err());
    }
}
