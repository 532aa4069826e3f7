//! Action policy registry
//!
//! Maps operation identifiers to their [`ActionPolicy`]. The registry is
//! immutable once built; share it behind an `Arc`.

use crate::error::{GuardError, Result};
use crate::policy::{ActionPolicy, ImpactScope, Severity};
use std::collections::{BTreeMap, HashMap};

/// Static description of a built-in guarded operation.
struct Builtin {
    tool: &'static str,
    severity: Severity,
    category: &'static str,
    description: &'static str,
    warning: &'static str,
    phrase: &'static str,
    reversible: bool,
    scope: ImpactScope,
}

const VM: &str = "Virtual Machine Operations";
const BARE_METAL: &str = "Bare Metal Operations";
const KUBERNETES: &str = "Kubernetes Operations";
const DATABASE: &str = "Database Operations";
const STORAGE: &str = "Storage Operations";
const BACKUP: &str = "Backup and Snapshot Operations";
const NETWORK: &str = "Network Operations";
const DNS: &str = "DNS Operations";
const SECURITY: &str = "Security Operations";
const ACCOUNT: &str = "Account Operations";

const BUILTINS: &[Builtin] = &[
    // Virtual machines
    Builtin {
        tool: "destroy_virtual_machine",
        severity: Severity::Critical,
        category: VM,
        description: "Permanently destroy a virtual machine instance",
        warning: "The instance and all data on its disks will be permanently deleted. This cannot be undone.",
        phrase: "destroy permanently",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "reinstall_virtual_machine",
        severity: Severity::Critical,
        category: VM,
        description: "Reinstall the operating system of a virtual machine",
        warning: "All data on the instance will be erased and the operating system reinstalled.",
        phrase: "reinstall and erase",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "restore_virtual_machine",
        severity: Severity::High,
        category: VM,
        description: "Restore a virtual machine from a backup or snapshot",
        warning: "Current instance data will be overwritten by the restore source.",
        phrase: "overwrite with restore",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "halt_virtual_machine",
        severity: Severity::Medium,
        category: VM,
        description: "Halt (power off) a virtual machine",
        warning: "Services running on the instance will become unavailable until it is started again.",
        phrase: "halt instance",
        reversible: true,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "reboot_virtual_machine",
        severity: Severity::Medium,
        category: VM,
        description: "Reboot a virtual machine",
        warning: "Services on the instance will be interrupted while it restarts.",
        phrase: "reboot instance",
        reversible: true,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "halt_virtual_machines",
        severity: Severity::High,
        category: VM,
        description: "Halt several virtual machines at once",
        warning: "Every listed instance will be powered off.",
        phrase: "halt all listed instances",
        reversible: true,
        scope: ImpactScope::Infrastructure,
    },
    // Bare metal
    Builtin {
        tool: "destroy_bare_metal",
        severity: Severity::Critical,
        category: BARE_METAL,
        description: "Permanently destroy a bare metal server",
        warning: "The server and all data on its disks will be permanently deleted.",
        phrase: "destroy bare metal",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "reinstall_bare_metal",
        severity: Severity::Critical,
        category: BARE_METAL,
        description: "Reinstall the operating system of a bare metal server",
        warning: "All data on the server will be erased.",
        phrase: "reinstall and erase",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "halt_bare_metal",
        severity: Severity::Medium,
        category: BARE_METAL,
        description: "Halt a bare metal server",
        warning: "Services running on the server will become unavailable.",
        phrase: "halt server",
        reversible: true,
        scope: ImpactScope::ServiceDisruption,
    },
    // Kubernetes
    Builtin {
        tool: "delete_kubernetes_cluster",
        severity: Severity::Critical,
        category: KUBERNETES,
        description: "Delete a Kubernetes cluster",
        warning: "The cluster, its node pools and every workload running on it will be deleted.",
        phrase: "delete cluster",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_kubernetes_cluster_with_resources",
        severity: Severity::Critical,
        category: KUBERNETES,
        description: "Delete a Kubernetes cluster together with its linked resources",
        warning: "The cluster and its load balancers and block storage volumes will all be deleted.",
        phrase: "delete cluster and resources",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_node_pool",
        severity: Severity::High,
        category: KUBERNETES,
        description: "Delete a Kubernetes node pool",
        warning: "All nodes in the pool will be destroyed and their workloads rescheduled or lost.",
        phrase: "delete node pool",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    // Databases
    Builtin {
        tool: "delete_managed_database",
        severity: Severity::Critical,
        category: DATABASE,
        description: "Delete a managed database",
        warning: "The database and all of its data will be permanently deleted.",
        phrase: "delete database permanently",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "restore_managed_database",
        severity: Severity::High,
        category: DATABASE,
        description: "Restore a managed database from backup",
        warning: "Data written after the backup point will be lost.",
        phrase: "restore database",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "delete_database_user",
        severity: Severity::Medium,
        category: DATABASE,
        description: "Delete a managed database user",
        warning: "Applications using this user will lose database access.",
        phrase: "delete database user",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    // Storage
    Builtin {
        tool: "delete_block_storage",
        severity: Severity::Critical,
        category: STORAGE,
        description: "Delete a block storage volume",
        warning: "All data on the volume will be permanently deleted.",
        phrase: "delete volume",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "detach_block_storage",
        severity: Severity::Medium,
        category: STORAGE,
        description: "Detach a block storage volume from its instance",
        warning: "The instance will lose access to the volume; unflushed writes may be lost.",
        phrase: "detach volume",
        reversible: true,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "delete_object_storage",
        severity: Severity::Critical,
        category: STORAGE,
        description: "Delete an object storage subscription",
        warning: "Every bucket and object in the subscription will be purged.",
        phrase: "purge object storage",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "purge_object_storage_bucket",
        severity: Severity::Critical,
        category: STORAGE,
        description: "Delete every object in a storage bucket",
        warning: "All objects in the bucket will be permanently deleted. The bucket itself is kept.",
        phrase: "purge bucket",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "regenerate_object_storage_keys",
        severity: Severity::High,
        category: STORAGE,
        description: "Regenerate object storage access keys",
        warning: "Existing keys stop working immediately; clients must be reconfigured.",
        phrase: "regenerate keys",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    // Backups and snapshots
    Builtin {
        tool: "delete_snapshot",
        severity: Severity::High,
        category: BACKUP,
        description: "Delete a snapshot",
        warning: "The snapshot will be permanently deleted and can no longer be restored from.",
        phrase: "delete snapshot",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "delete_backup",
        severity: Severity::High,
        category: BACKUP,
        description: "Delete a backup",
        warning: "The backup will be permanently deleted.",
        phrase: "delete backup",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    // Networking
    Builtin {
        tool: "delete_vpc",
        severity: Severity::High,
        category: NETWORK,
        description: "Delete a virtual private cloud network",
        warning: "Attached instances will lose private connectivity.",
        phrase: "delete network",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_load_balancer",
        severity: Severity::High,
        category: NETWORK,
        description: "Delete a load balancer",
        warning: "Traffic routed through the load balancer will stop immediately.",
        phrase: "delete load balancer",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "delete_reserved_ip",
        severity: Severity::High,
        category: NETWORK,
        description: "Release a reserved IP address",
        warning: "The address returns to the provider pool and may never be obtainable again.",
        phrase: "release ip",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    Builtin {
        tool: "restart_network",
        severity: Severity::High,
        category: NETWORK,
        description: "Restart networking for a resource",
        warning: "Network connectivity will be interrupted during the restart.",
        phrase: "restart network",
        reversible: true,
        scope: ImpactScope::ServiceDisruption,
    },
    // DNS
    Builtin {
        tool: "delete_dns_domain",
        severity: Severity::Critical,
        category: DNS,
        description: "Delete a DNS domain and all of its records",
        warning: "Every record in the zone is removed; the domain stops resolving.",
        phrase: "delete domain",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_dns_record",
        severity: Severity::Medium,
        category: DNS,
        description: "Delete a DNS record",
        warning: "Lookups for this record will fail once caches expire.",
        phrase: "delete record",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    // Security
    Builtin {
        tool: "delete_firewall_group",
        severity: Severity::High,
        category: SECURITY,
        description: "Delete a firewall group",
        warning: "Instances attached to the group lose its rules and may become exposed.",
        phrase: "delete firewall",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_firewall_rule",
        severity: Severity::Medium,
        category: SECURITY,
        description: "Delete a firewall rule",
        warning: "Traffic allowed or blocked by this rule will be handled by the remaining rules.",
        phrase: "delete rule",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
    Builtin {
        tool: "delete_ssh_key",
        severity: Severity::Medium,
        category: SECURITY,
        description: "Delete an SSH key",
        warning: "New deployments can no longer use this key.",
        phrase: "delete ssh key",
        reversible: false,
        scope: ImpactScope::SingleResource,
    },
    // Account
    Builtin {
        tool: "delete_account",
        severity: Severity::Critical,
        category: ACCOUNT,
        description: "Close the account",
        warning: "Every resource, backup, user and API key on the account will be deleted and billing closed.",
        phrase: "delete entire account",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_user",
        severity: Severity::Critical,
        category: ACCOUNT,
        description: "Delete an account user",
        warning: "The user loses all access and their API keys are revoked.",
        phrase: "delete user",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "delete_sub_account",
        severity: Severity::Critical,
        category: ACCOUNT,
        description: "Delete a sub-account",
        warning: "The sub-account and every resource it owns will be removed.",
        phrase: "delete account",
        reversible: false,
        scope: ImpactScope::Infrastructure,
    },
    Builtin {
        tool: "revoke_api_key",
        severity: Severity::High,
        category: ACCOUNT,
        description: "Revoke an API key",
        warning: "Integrations using this key stop working immediately.",
        phrase: "revoke key",
        reversible: false,
        scope: ImpactScope::ServiceDisruption,
    },
];

impl Builtin {
    fn to_policy(&self) -> ActionPolicy {
        ActionPolicy::new(
            self.severity,
            self.category,
            self.description,
            self.warning,
            self.phrase,
            self.reversible,
            self.scope,
        )
    }
}

/// Registry of guarded operations
#[derive(Debug, Clone, Default)]
pub struct ActionPolicyRegistry {
    policies: HashMap<String, ActionPolicy>,
}

impl ActionPolicyRegistry {
    /// An empty registry: nothing is guarded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in table of dangerous cloud operations.
    pub fn builtin() -> Self {
        let policies = BUILTINS
            .iter()
            .map(|b| (b.tool.to_string(), b.to_policy()))
            .collect();
        Self { policies }
    }

    /// Build a registry from explicit policies.
    pub fn from_policies<I, S>(policies: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ActionPolicy)>,
        S: Into<String>,
    {
        Self::empty().with_overrides(policies)
    }

    /// Add or replace policies. Every policy must name a tool and carry a
    /// non-empty confirmation phrase.
    pub fn with_overrides<I, S>(mut self, policies: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ActionPolicy)>,
        S: Into<String>,
    {
        for (tool, policy) in policies {
            let tool = tool.into();
            if tool.trim().is_empty() {
                return Err(GuardError::InvalidPolicy {
                    tool,
                    reason: "tool name is empty".to_string(),
                });
            }
            if policy.required_confirmation.trim().is_empty() {
                return Err(GuardError::InvalidPolicy {
                    tool,
                    reason: "required confirmation phrase is empty".to_string(),
                });
            }
            self.policies.insert(tool, policy);
        }
        Ok(self)
    }

    /// Look up the policy for an operation.
    pub fn lookup(&self, tool: &str) -> Option<&ActionPolicy> {
        self.policies.get(tool)
    }

    /// Whether the operation is guarded.
    pub fn is_dangerous(&self, tool: &str) -> bool {
        self.lookup(tool).is_some()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// All guarded operations, sorted by tool name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionPolicy)> {
        let mut entries: Vec<_> = self
            .policies
            .iter()
            .map(|(tool, policy)| (tool.as_str(), policy))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Tool names grouped by category.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (tool, policy) in self.iter() {
            groups.entry(policy.category.as_str()).or_default().push(tool);
        }
        groups
    }

    /// Tool names with the given severity, sorted.
    pub fn by_severity(&self, severity: Severity) -> Vec<&str> {
        self.iter()
            .filter(|(_, policy)| policy.severity == severity)
            .map(|(tool, _)| tool)
            .collect()
    }
}
