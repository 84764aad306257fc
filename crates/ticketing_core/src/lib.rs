pub mod clock;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod recurrence;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    AccountType, Event, EventFilter, EventImage, EventPatch, EventQuery, EventSort, HostInfo,
    Income, NewEvent, NewUser, Organizer, Page, PageSection, Payout, Recurrence, User,
    UserCredentials, UserPatch,
};
pub use memory::MemoryStore;
pub use ports::{EventStore, PageStore, PortError, PortResult, UserStore};
pub use recurrence::{SweepKind, SweepReport};
pub use session::{PresentedTokens, ResolvedSession, SessionError};
pub use token::{InvalidToken, TokenError, TokenKind, TokenPair, TokenSecrets, TokenService};
