//! Contract bindings used by the agent.

use ethers::contract::abigen;

abigen!(
    Erc20,
    r#"[
        function decimals() view returns (uint8)
        function balanceOf(address owner) view returns (uint256)
        function approve(address spender, uint256 amount) returns (bool)
        function allowance(address owner, address spender) view returns (uint256)
    ]"#
);

abigen!(
    WrappedNative,
    r#"[
        function deposit() payable
        function withdraw(uint256 wad)
    ]"#
);

abigen!(
    CloberRouter,
    r#"[
        function swap(address inToken, address outToken, uint256 inAmount, address recipient, bytes data) payable
    ]"#
);
